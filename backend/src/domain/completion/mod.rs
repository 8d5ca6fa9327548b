//! Completion evaluation for modules and courses.
//!
//! Module progress counts the module's lessons. Course progress pools every
//! lesson of every module with the course's assignments and quizzes, so it
//! is not derived from module percentages. The `evaluate_*` methods only
//! persist state; the cascade methods also run the completion badge rules
//! and are the path the dispatcher takes.

use std::sync::Arc;

use mockable::Clock;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::Error;
use crate::domain::badges::{AwardOutcome, BadgeEngine, BadgeTrigger};
use crate::domain::course::{CourseItem, CourseOutline, ModuleOutline};
use crate::domain::ids::{AssignmentId, CourseId, LessonId, ModuleId, QuizId, StudentId};
use crate::domain::percentage::Percentage;
use crate::domain::ports::{ActivityRepository, CourseCatalog, EnginePorts, ProgressRepository};
use crate::domain::preconditions::{course_not_found, enrollment_missing, item_not_found};

/// Course percentage from item counts; zero when the course is empty.
pub fn course_percentage(completed_items: u64, total_items: u64) -> Percentage {
    Percentage::from_ratio(completed_items, total_items).unwrap_or(Percentage::ZERO)
}

/// Result of a module recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModuleCompletion {
    pub module_id: ModuleId,
    pub percentage: Percentage,
    pub is_completed: bool,
    /// Whether this recomputation flipped the module to completed.
    pub newly_completed: bool,
}

/// When the module completion badge rule runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleBadgeRule {
    /// Only on the write that completes the module.
    OnTransition,
    /// Whenever the module reads completed, so missed grants are filled in.
    WhileCompleted,
}

/// A recomputation together with the badges its rules produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Cascade<T> {
    pub value: T,
    pub awards: Vec<AwardOutcome>,
}

/// Recomputes and stores completion state.
#[derive(Clone)]
pub struct CompletionEvaluator {
    catalog: Arc<dyn CourseCatalog>,
    progress: Arc<dyn ProgressRepository>,
    activity: Arc<dyn ActivityRepository>,
    badges: BadgeEngine,
    clock: Arc<dyn Clock>,
}

impl CompletionEvaluator {
    /// Create an evaluator over the engine's ports.
    pub fn new(ports: &EnginePorts, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: ports.catalog.clone(),
            progress: ports.progress.clone(),
            activity: ports.activity.clone(),
            badges: BadgeEngine::new(ports, clock.clone()),
            clock,
        }
    }

    /// Recompute a module and grant its badge on the completing transition.
    pub async fn recompute_module_progress(
        &self,
        student_id: StudentId,
        module_id: ModuleId,
    ) -> Result<ModuleCompletion, Error> {
        let item = CourseItem::Module(module_id);
        let course = self
            .catalog
            .find_course_containing(item)
            .await?
            .ok_or_else(|| item_not_found(item))?;
        let module = course
            .module(module_id)
            .ok_or_else(|| item_not_found(item))?;

        let cascade = self
            .cascade_module(student_id, course.id, module, ModuleBadgeRule::OnTransition)
            .await?;
        Ok(cascade.value)
    }

    /// Recompute a course and grant its badge when it reaches 100%.
    ///
    /// Fails with `PreconditionFailed` when the student is not enrolled;
    /// enrollments are never created here.
    pub async fn recompute_course_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Percentage, Error> {
        let course = self
            .catalog
            .find_course(&course_id)
            .await?
            .ok_or_else(|| course_not_found(course_id))?;

        let cascade = self.cascade_course(student_id, &course).await?;
        Ok(cascade.value)
    }

    /// Evaluate a module of `course_id` and run the module badge rule.
    pub async fn cascade_module(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        module: &ModuleOutline,
        rule: ModuleBadgeRule,
    ) -> Result<Cascade<ModuleCompletion>, Error> {
        let completion = self.evaluate_module(student_id, module).await?;
        let earned = match rule {
            ModuleBadgeRule::OnTransition => completion.newly_completed,
            ModuleBadgeRule::WhileCompleted => completion.is_completed,
        };
        let awards = if earned {
            self.badges
                .apply_rules(
                    student_id,
                    BadgeTrigger::ModuleCompleted {
                        course_id,
                        module_id: module.id,
                    },
                )
                .await?
        } else {
            Vec::new()
        };
        Ok(Cascade {
            value: completion,
            awards,
        })
    }

    /// Evaluate a course and run the course badge rule when it is complete.
    pub async fn cascade_course(
        &self,
        student_id: StudentId,
        course: &CourseOutline,
    ) -> Result<Cascade<Percentage>, Error> {
        let percentage = self.evaluate_course(student_id, course).await?;
        let awards = if percentage.is_complete() {
            self.badges
                .apply_rules(
                    student_id,
                    BadgeTrigger::CourseCompleted {
                        course_id: course.id,
                    },
                )
                .await?
        } else {
            Vec::new()
        };
        Ok(Cascade {
            value: percentage,
            awards,
        })
    }

    /// Recompute and persist a module's progress without awarding badges.
    pub async fn evaluate_module(
        &self,
        student_id: StudentId,
        module: &ModuleOutline,
    ) -> Result<ModuleCompletion, Error> {
        let total_lessons = module.lesson_ids.len() as u64;
        let completed_lessons = self
            .progress
            .count_completed_lessons(&student_id, &module.lesson_ids)
            .await?;

        let mut row = self
            .progress
            .find_or_create_module_progress(&student_id, &module.id)
            .await?;
        row.apply(completed_lessons, total_lessons, self.clock.utc());
        let write = self.progress.save_module_progress(&row).await?;
        let newly_completed = write.completed_now;
        let row = write.stored;

        if newly_completed {
            info!(
                student_id = %student_id,
                module_id = %module.id,
                "module completed"
            );
        } else {
            debug!(
                student_id = %student_id,
                module_id = %module.id,
                completed_lessons,
                total_lessons,
                percentage = row.completion_percentage.value(),
                "module progress recomputed"
            );
        }

        Ok(ModuleCompletion {
            module_id: module.id,
            percentage: row.completion_percentage,
            is_completed: row.is_completed,
            newly_completed,
        })
    }

    /// Recompute and persist a course's progress without awarding badges.
    ///
    /// Returns the stored percentage, which never drops below an earlier
    /// recomputation.
    pub async fn evaluate_course(
        &self,
        student_id: StudentId,
        course: &CourseOutline,
    ) -> Result<Percentage, Error> {
        self.progress
            .find_enrollment(&student_id, &course.id)
            .await?
            .ok_or_else(|| enrollment_missing(student_id, course.id))?;

        let lesson_ids: Vec<LessonId> = course.lesson_ids().collect();
        let assignment_ids: Vec<AssignmentId> = course.assignments.iter().map(|a| a.id).collect();
        let quiz_ids: Vec<QuizId> = course.quizzes.iter().map(|q| q.id).collect();

        let lessons = self
            .progress
            .count_completed_lessons(&student_id, &lesson_ids)
            .await?;
        let assignments = self
            .activity
            .count_graded_submissions(&student_id, &assignment_ids)
            .await?;
        let quizzes = self
            .activity
            .count_completed_quizzes(&student_id, &quiz_ids)
            .await?;

        let completed_items = lessons + assignments + quizzes;
        let total_items = course.total_items();
        let percentage = self
            .progress
            .update_enrollment_progress(
                &student_id,
                &course.id,
                course_percentage(completed_items, total_items),
            )
            .await?;

        debug!(
            student_id = %student_id,
            course_id = %course.id,
            completed_items,
            total_items,
            percentage = percentage.value(),
            "course progress recomputed"
        );
        Ok(percentage)
    }
}
