//! Badge awarding service.

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::{debug, info};

use crate::domain::Error;
use crate::domain::ids::{AwardId, BadgeId, CourseId, InstructorId, StudentId};
use crate::domain::ports::{BadgeRepository, CourseCatalog, EnginePorts, ProgressRepository};
use crate::domain::preconditions::{course_not_found, enrollment_missing};
use crate::domain::profiles::ProfileAggregator;

use super::model::{
    AwardOrigin, AwardOutcome, Badge, BadgeDefinition, BadgeScope, CANONICAL_BADGES,
    NewStudentBadge,
};
use super::rules::{BadgeTrigger, rules_for};

/// A manual award request from an instructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructorAward {
    pub instructor_id: InstructorId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub badge_id: BadgeId,
    pub note: Option<String>,
}

/// Grants badges idempotently and keeps the catalog seeded.
#[derive(Clone)]
pub struct BadgeEngine {
    catalog: Arc<dyn CourseCatalog>,
    progress: Arc<dyn ProgressRepository>,
    badges: Arc<dyn BadgeRepository>,
    profiles: ProfileAggregator,
    clock: Arc<dyn Clock>,
}

impl BadgeEngine {
    /// Create an engine over the engine's ports.
    pub fn new(ports: &EnginePorts, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: ports.catalog.clone(),
            progress: ports.progress.clone(),
            badges: ports.badges.clone(),
            profiles: ProfileAggregator::new(ports, clock.clone()),
            clock,
        }
    }

    /// Resolve the catalog entry for `definition`, seeding it when absent.
    pub async fn catalog_entry(&self, definition: &BadgeDefinition) -> Result<Badge, Error> {
        let entry = self.badges.find_or_seed(definition).await?;
        if entry.created {
            info!(
                badge_type = %definition.badge_type,
                name = definition.name,
                "seeded badge catalog entry"
            );
        }
        Ok(entry.badge)
    }

    /// Seed every canonical badge. Returns how many entries were created.
    pub async fn seed_catalog(&self) -> Result<usize, Error> {
        let mut created = 0;
        for definition in &CANONICAL_BADGES {
            if self.badges.find_or_seed(definition).await?.created {
                created += 1;
            }
        }
        info!(created, "badge catalog seeded");
        Ok(created)
    }

    /// Award a badge without touching profiles.
    ///
    /// Callers that award several badges in one pass refresh the profile
    /// once afterwards.
    pub async fn award(
        &self,
        student_id: StudentId,
        definition: &BadgeDefinition,
        scope: BadgeScope,
        origin: AwardOrigin,
    ) -> Result<AwardOutcome, Error> {
        let badge = self.catalog_entry(definition).await?;
        self.insert_award(student_id, &badge, scope, origin).await
    }

    /// Award a badge and refresh the affected profiles when it is new.
    pub async fn grant_if_eligible(
        &self,
        student_id: StudentId,
        definition: &BadgeDefinition,
        scope: BadgeScope,
        origin: AwardOrigin,
    ) -> Result<AwardOutcome, Error> {
        let outcome = self
            .award(student_id, definition, scope, origin.clone())
            .await?;
        if outcome.is_granted() {
            self.refresh_after_grant(student_id, &origin).await?;
        }
        Ok(outcome)
    }

    /// Award every badge the rule table yields for `trigger`, without
    /// touching profiles.
    pub async fn apply_rules(
        &self,
        student_id: StudentId,
        trigger: BadgeTrigger,
    ) -> Result<Vec<AwardOutcome>, Error> {
        let mut outcomes = Vec::new();
        for grant in rules_for(trigger) {
            let outcome = self
                .award(
                    student_id,
                    &grant.definition,
                    grant.scope,
                    AwardOrigin::Automatic,
                )
                .await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Award an existing catalog badge by hand.
    ///
    /// The instructor must own the course and the student must be enrolled
    /// in it. A repeat award returns [`AwardOutcome::AlreadyHeld`].
    pub async fn award_by_instructor(&self, request: InstructorAward) -> Result<AwardOutcome, Error> {
        let InstructorAward {
            instructor_id,
            student_id,
            course_id,
            badge_id,
            note,
        } = request;

        let course = self
            .catalog
            .find_course(&course_id)
            .await?
            .ok_or_else(|| course_not_found(course_id))?;
        if course.instructor_id != instructor_id {
            return Err(Error::precondition_failed(format!(
                "instructor {instructor_id} does not teach course {course_id}"
            ))
            .with_details(json!({
                "code": "not_course_instructor",
                "instructorId": instructor_id,
                "courseId": course_id,
            })));
        }
        self.progress
            .find_enrollment(&student_id, &course_id)
            .await?
            .ok_or_else(|| enrollment_missing(student_id, course_id))?;
        let badge = self
            .badges
            .find_badge(&badge_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("badge {badge_id} not found")))?;

        let origin = AwardOrigin::Instructor {
            instructor_id,
            note: note.filter(|text| !text.trim().is_empty()),
        };
        let scope = BadgeScope::Course { course_id };
        let outcome = self
            .insert_award(student_id, &badge, scope, origin.clone())
            .await?;
        if outcome.is_granted() {
            self.refresh_after_grant(student_id, &origin).await?;
        }
        Ok(outcome)
    }

    async fn insert_award(
        &self,
        student_id: StudentId,
        badge: &Badge,
        scope: BadgeScope,
        origin: AwardOrigin,
    ) -> Result<AwardOutcome, Error> {
        let award = NewStudentBadge {
            id: AwardId::random(),
            student_id,
            badge_id: badge.id,
            scope,
            awarded_at: self.clock.utc(),
            origin,
        };
        let outcome = self.badges.insert_award_if_absent(&award).await?;

        if outcome.is_granted() {
            info!(
                student_id = %student_id,
                badge = %badge.name,
                course_id = %scope.course_id(),
                "badge awarded"
            );
        } else {
            debug!(
                student_id = %student_id,
                badge = %badge.name,
                "badge already held"
            );
        }
        Ok(outcome)
    }

    async fn refresh_after_grant(
        &self,
        student_id: StudentId,
        origin: &AwardOrigin,
    ) -> Result<(), Error> {
        self.profiles.refresh_student_profile(student_id).await?;
        if let AwardOrigin::Instructor { instructor_id, .. } = origin {
            self.profiles
                .refresh_instructor_profile(*instructor_id)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
