//! Student and instructor profile rollups.
//!
//! Profiles are denormalised counters kept for cheap reads. They are never a
//! source of truth: every refresh recomputes each counter from the
//! underlying facts and overwrites the stored row, so repeating a refresh is
//! always safe.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Error;
use crate::domain::ids::{InstructorId, StudentId};
use crate::domain::ports::{
    BadgeRepository, CourseCatalog, EnginePorts, ProfileRepository, ProgressRepository,
};

/// Rollup of a student's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: StudentId,
    pub courses_enrolled: u64,
    pub courses_completed: u64,
    pub modules_completed: u64,
    pub badges_earned: u64,
    pub updated_at: DateTime<Utc>,
}

/// Rollup of an instructor's teaching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorProfile {
    pub instructor_id: InstructorId,
    pub courses_created: u64,
    pub students: u64,
    pub badges_awarded: u64,
    pub updated_at: DateTime<Utc>,
}

/// Recomputes and stores profile rollups.
#[derive(Clone)]
pub struct ProfileAggregator {
    catalog: Arc<dyn CourseCatalog>,
    progress: Arc<dyn ProgressRepository>,
    badges: Arc<dyn BadgeRepository>,
    profiles: Arc<dyn ProfileRepository>,
    clock: Arc<dyn Clock>,
}

impl ProfileAggregator {
    /// Create an aggregator over the engine's ports.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use mockable::DefaultClock;
    /// use lms_backend::domain::ports::EnginePorts;
    /// use lms_backend::domain::ProfileAggregator;
    /// use lms_backend::outbound::memory::InMemoryLearningStore;
    ///
    /// let ports = EnginePorts::from_store(Arc::new(InMemoryLearningStore::default()));
    /// let _aggregator = ProfileAggregator::new(&ports, Arc::new(DefaultClock));
    /// ```
    pub fn new(ports: &EnginePorts, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: ports.catalog.clone(),
            progress: ports.progress.clone(),
            badges: ports.badges.clone(),
            profiles: ports.profiles.clone(),
            clock,
        }
    }

    /// Recompute a student's counters, creating the profile when missing.
    pub async fn refresh_student_profile(
        &self,
        student_id: StudentId,
    ) -> Result<StudentProfile, Error> {
        let enrollments = self
            .progress
            .list_enrollments_for_student(&student_id)
            .await?;
        let modules_completed = self.progress.count_completed_modules(&student_id).await?;
        let badges_earned = self.badges.count_awards_for_student(&student_id).await?;

        let profile = StudentProfile {
            student_id,
            courses_enrolled: enrollments.len() as u64,
            courses_completed: enrollments.iter().filter(|e| e.is_complete()).count() as u64,
            modules_completed,
            badges_earned,
            updated_at: self.clock.utc(),
        };
        self.profiles.save_student_profile(&profile).await?;

        debug!(
            student_id = %student_id,
            courses_enrolled = profile.courses_enrolled,
            badges_earned = profile.badges_earned,
            "student profile refreshed"
        );
        Ok(profile)
    }

    /// Recompute an instructor's counters, creating the profile when
    /// missing.
    pub async fn refresh_instructor_profile(
        &self,
        instructor_id: InstructorId,
    ) -> Result<InstructorProfile, Error> {
        let courses = self
            .catalog
            .list_courses_for_instructor(&instructor_id)
            .await?;
        let students = self.progress.count_distinct_students(&courses).await?;
        let badges_awarded = self
            .badges
            .count_awards_by_instructor(&instructor_id)
            .await?;

        let profile = InstructorProfile {
            instructor_id,
            courses_created: courses.len() as u64,
            students,
            badges_awarded,
            updated_at: self.clock.utc(),
        };
        self.profiles.save_instructor_profile(&profile).await?;

        debug!(
            instructor_id = %instructor_id,
            courses_created = profile.courses_created,
            students = profile.students,
            "instructor profile refreshed"
        );
        Ok(profile)
    }
}

#[cfg(test)]
#[path = "profiles_tests.rs"]
mod tests;
