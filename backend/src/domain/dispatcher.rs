//! Ordered progress pipeline run after each student action.
//!
//! Every event walks the same stages: persist the fact, recompute the module
//! (lesson events only), recompute the course, apply badge rules, then
//! refresh the student's profile if any badge was newly granted. Each stage
//! is safe to repeat, so an interrupted pipeline converges on the next event
//! or on an explicit [`ProgressDispatcher::sweep`].

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::{debug, info};

use crate::domain::Error;
use crate::domain::activity::{
    AnswerSubmission, AssignmentSubmission, QuizAttempt, grade_answers,
};
use crate::domain::badges::{AwardOutcome, BadgeEngine, BadgeTrigger};
use crate::domain::completion::{CompletionEvaluator, ModuleBadgeRule, ModuleCompletion};
use crate::domain::course::{CourseItem, CourseOutline};
use crate::domain::ids::{AttemptId, CourseId, LessonId, QuizId, StudentId};
use crate::domain::percentage::Percentage;
use crate::domain::ports::{ActivityRepository, CourseCatalog, EnginePorts, ProgressRepository};
use crate::domain::preconditions::{course_not_found, enrollment_missing, item_not_found};
use crate::domain::profiles::{ProfileAggregator, StudentProfile};
use crate::domain::progress::{Enrollment, LessonProgress};

/// Result of a lesson completion event.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonOutcome {
    pub lesson: LessonProgress,
    pub module: ModuleCompletion,
    pub course_progress: Percentage,
    pub awards: Vec<AwardOutcome>,
}

/// Result of a graded assignment or completed quiz event.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOutcome {
    pub course_progress: Percentage,
    pub awards: Vec<AwardOutcome>,
}

/// Result of an enrollment request.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollOutcome {
    pub enrollment: Enrollment,
    /// Whether this call created the enrollment.
    pub created: bool,
}

/// Result of starting a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizAttemptStart {
    /// A fresh attempt was opened.
    Started(QuizAttempt),
    /// An unfinished attempt already existed and is handed back.
    Resumed(QuizAttempt),
    /// The student already completed the quiz; no attempt was opened.
    AlreadyCompleted(QuizAttempt),
}

impl QuizAttemptStart {
    /// The attempt in any state.
    pub fn attempt(&self) -> &QuizAttempt {
        match self {
            Self::Started(attempt) | Self::Resumed(attempt) | Self::AlreadyCompleted(attempt) => {
                attempt
            }
        }
    }
}

/// Result of a convergence sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    pub modules: Vec<ModuleCompletion>,
    pub course_progress: Percentage,
    /// Badges this sweep created.
    pub awards_granted: usize,
    pub profile: StudentProfile,
}

fn granted_count(awards: &[AwardOutcome]) -> usize {
    awards.iter().filter(|outcome| outcome.is_granted()).count()
}

/// Entry point for student actions that move progress.
#[derive(Clone)]
pub struct ProgressDispatcher {
    catalog: Arc<dyn CourseCatalog>,
    progress: Arc<dyn ProgressRepository>,
    activity: Arc<dyn ActivityRepository>,
    evaluator: CompletionEvaluator,
    badges: BadgeEngine,
    profiles: ProfileAggregator,
    clock: Arc<dyn Clock>,
}

impl ProgressDispatcher {
    /// Create a dispatcher over the engine's ports.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use mockable::DefaultClock;
    /// use lms_backend::domain::ProgressDispatcher;
    /// use lms_backend::domain::ports::EnginePorts;
    /// use lms_backend::outbound::memory::InMemoryLearningStore;
    ///
    /// let ports = EnginePorts::from_store(Arc::new(InMemoryLearningStore::new()));
    /// let _dispatcher = ProgressDispatcher::new(&ports, Arc::new(DefaultClock));
    /// ```
    pub fn new(ports: &EnginePorts, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog: ports.catalog.clone(),
            progress: ports.progress.clone(),
            activity: ports.activity.clone(),
            evaluator: CompletionEvaluator::new(ports, clock.clone()),
            badges: BadgeEngine::new(ports, clock.clone()),
            profiles: ProfileAggregator::new(ports, clock.clone()),
            clock,
        }
    }

    /// Enroll a student, creating the enrollment at most once.
    pub async fn enroll(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<EnrollOutcome, Error> {
        let course = self.course(course_id).await?;
        let candidate = Enrollment::new(student_id, course_id, self.clock.utc());
        let inserted = self.progress.insert_enrollment_if_absent(&candidate).await?;
        if !inserted.created {
            return Ok(EnrollOutcome {
                enrollment: inserted.enrollment,
                created: false,
            });
        }

        info!(student_id = %student_id, course_id = %course_id, "student enrolled");
        let mut enrollment = inserted.enrollment;
        enrollment.progress = self.on_enrollment_created(&enrollment).await?;
        self.profiles.refresh_student_profile(student_id).await?;
        self.profiles
            .refresh_instructor_profile(course.instructor_id)
            .await?;
        Ok(EnrollOutcome {
            enrollment,
            created: true,
        })
    }

    /// Run the initial course recompute for a stored enrollment.
    pub async fn on_enrollment_created(&self, enrollment: &Enrollment) -> Result<Percentage, Error> {
        let course = self.course(enrollment.course_id).await?;
        let course_stage = self
            .evaluator
            .cascade_course(enrollment.student_id, &course)
            .await?;
        self.refresh_if_granted(enrollment.student_id, &course_stage.awards)
            .await?;
        Ok(course_stage.value)
    }

    /// Record a lesson completion and cascade it.
    pub async fn on_lesson_marked_complete(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<LessonOutcome, Error> {
        let item = CourseItem::Lesson(lesson_id);
        let course = self.course_containing(item).await?;
        let module = course
            .module_for_lesson(lesson_id)
            .ok_or_else(|| item_not_found(item))?;
        self.require_enrollment(student_id, course.id).await?;

        let lesson = self
            .progress
            .complete_lesson(&student_id, &lesson_id, self.clock.utc())
            .await?;
        let module_stage = self
            .evaluator
            .cascade_module(student_id, course.id, module, ModuleBadgeRule::OnTransition)
            .await?;
        let course_stage = self.evaluator.cascade_course(student_id, &course).await?;
        let course_progress = course_stage.value;
        let mut awards = module_stage.awards;
        awards.extend(course_stage.awards);
        self.refresh_if_granted(student_id, &awards).await?;

        info!(
            student_id = %student_id,
            lesson_id = %lesson_id,
            course_progress = course_progress.value(),
            awards_granted = granted_count(&awards),
            "lesson completion processed"
        );
        Ok(LessonOutcome {
            lesson,
            module: module_stage.value,
            course_progress,
            awards,
        })
    }

    /// Record a graded submission and cascade it.
    pub async fn on_assignment_graded(
        &self,
        submission: AssignmentSubmission,
    ) -> Result<ActivityOutcome, Error> {
        let Some(marks) = submission.marks else {
            return Err(Error::precondition_failed(format!(
                "submission {} has not been graded",
                submission.id
            ))
            .with_details(json!({
                "code": "submission_ungraded",
                "submissionId": submission.id,
            })));
        };
        let item = CourseItem::Assignment(submission.assignment_id);
        let course = self.course_containing(item).await?;
        let max_marks = course
            .assignment(submission.assignment_id)
            .map(|assignment| assignment.max_marks)
            .ok_or_else(|| item_not_found(item))?;
        let student_id = submission.student_id;
        self.require_enrollment(student_id, course.id).await?;

        self.activity.save_submission(&submission).await?;
        let course_stage = self.evaluator.cascade_course(student_id, &course).await?;
        let course_progress = course_stage.value;

        let mut awards = self
            .badges
            .apply_rules(
                student_id,
                BadgeTrigger::AssignmentGraded {
                    course_id: course.id,
                    marks,
                    max_marks,
                },
            )
            .await?;
        awards.extend(course_stage.awards);
        self.refresh_if_granted(student_id, &awards).await?;

        info!(
            student_id = %student_id,
            assignment_id = %submission.assignment_id,
            marks,
            max_marks,
            course_progress = course_progress.value(),
            "graded assignment processed"
        );
        Ok(ActivityOutcome {
            course_progress,
            awards,
        })
    }

    /// Record a completed quiz attempt and cascade it.
    pub async fn on_quiz_attempt_completed(
        &self,
        attempt: QuizAttempt,
    ) -> Result<ActivityOutcome, Error> {
        if !attempt.is_completed {
            return Err(Error::precondition_failed(format!(
                "quiz attempt {} is not completed",
                attempt.id
            ))
            .with_details(json!({
                "code": "attempt_incomplete",
                "attemptId": attempt.id,
            })));
        }
        let (course, max_marks) = self.quiz_course(attempt.quiz_id).await?;
        let student_id = attempt.student_id;
        self.require_enrollment(student_id, course.id).await?;

        let stored = self.activity.record_completed_attempt(&attempt).await?;
        self.cascade_quiz(stored, &course, max_marks).await
    }

    /// Open a quiz attempt, resuming an unfinished one when present.
    pub async fn start_quiz_attempt(
        &self,
        student_id: StudentId,
        quiz_id: QuizId,
    ) -> Result<QuizAttemptStart, Error> {
        let (course, _) = self.quiz_course(quiz_id).await?;
        self.require_enrollment(student_id, course.id).await?;

        let attempts = self.activity.list_attempts(&student_id, &quiz_id).await?;
        if let Some(done) = attempts.iter().find(|attempt| attempt.is_completed) {
            return Ok(QuizAttemptStart::AlreadyCompleted(done.clone()));
        }
        if let Some(open) = attempts.into_iter().last() {
            return Ok(QuizAttemptStart::Resumed(open));
        }

        let attempt = QuizAttempt::start(quiz_id, student_id, self.clock.utc());
        self.activity.insert_attempt(&attempt).await?;
        info!(
            student_id = %student_id,
            quiz_id = %quiz_id,
            attempt_id = %attempt.id,
            "quiz attempt started"
        );
        Ok(QuizAttemptStart::Started(attempt))
    }

    /// Grade and store answers, complete the attempt and cascade it.
    pub async fn submit_quiz_answers(
        &self,
        attempt_id: AttemptId,
        answers: &[AnswerSubmission],
    ) -> Result<ActivityOutcome, Error> {
        let attempt = self
            .activity
            .find_attempt(&attempt_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("quiz attempt {attempt_id} not found")))?;
        if attempt.is_completed {
            return Err(Error::precondition_failed(format!(
                "quiz attempt {attempt_id} was already submitted"
            ))
            .with_details(json!({
                "code": "quiz_already_completed",
                "attemptId": attempt_id,
            })));
        }
        let item = CourseItem::Quiz(attempt.quiz_id);
        let course = self.course_containing(item).await?;
        let quiz = course
            .quiz(attempt.quiz_id)
            .ok_or_else(|| item_not_found(item))?;
        self.require_enrollment(attempt.student_id, course.id)
            .await?;

        let graded = grade_answers(quiz, attempt.id, answers);
        let completed = attempt.complete(graded.score, self.clock.utc());
        // The attempt is recorded before its answers so a rejected completion
        // leaves no graded answers behind.
        let stored = self.activity.record_completed_attempt(&completed).await?;
        if stored.score == completed.score {
            self.activity.save_answers(&graded.answers).await?;
        } else {
            debug!(
                attempt_id = %attempt_id,
                stored_score = stored.score,
                "attempt already recorded by an earlier submission, keeping its answers"
            );
        }
        self.cascade_quiz(stored, &course, quiz.max_marks).await
    }

    /// Recompute everything for one student in one course and fill in any
    /// badges an interrupted pipeline missed.
    pub async fn sweep(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<SweepReport, Error> {
        let course = self.course(course_id).await?;
        self.require_enrollment(student_id, course_id).await?;

        let mut awards = Vec::new();
        let mut modules = Vec::with_capacity(course.modules.len());
        for module in &course.modules {
            let stage = self
                .evaluator
                .cascade_module(student_id, course_id, module, ModuleBadgeRule::WhileCompleted)
                .await?;
            awards.extend(stage.awards);
            modules.push(stage.value);
        }

        let course_stage = self.evaluator.cascade_course(student_id, &course).await?;
        let course_progress = course_stage.value;
        awards.extend(course_stage.awards);
        self.replay_activity_rules(student_id, &course, &mut awards)
            .await?;

        let profile = self.profiles.refresh_student_profile(student_id).await?;
        let awards_granted = granted_count(&awards);
        info!(
            student_id = %student_id,
            course_id = %course_id,
            course_progress = course_progress.value(),
            awards_granted,
            "progress sweep finished"
        );
        Ok(SweepReport {
            modules,
            course_progress,
            awards_granted,
            profile,
        })
    }

    async fn replay_activity_rules(
        &self,
        student_id: StudentId,
        course: &CourseOutline,
        awards: &mut Vec<AwardOutcome>,
    ) -> Result<(), Error> {
        let assignment_ids: Vec<_> = course.assignments.iter().map(|a| a.id).collect();
        let submissions = self
            .activity
            .list_graded_submissions(&student_id, &assignment_ids)
            .await?;
        for submission in submissions {
            let (Some(marks), Some(assignment)) =
                (submission.marks, course.assignment(submission.assignment_id))
            else {
                continue;
            };
            let trigger = BadgeTrigger::AssignmentGraded {
                course_id: course.id,
                marks,
                max_marks: assignment.max_marks,
            };
            awards.extend(self.badges.apply_rules(student_id, trigger).await?);
        }

        let quiz_ids: Vec<_> = course.quizzes.iter().map(|q| q.id).collect();
        let attempts = self
            .activity
            .list_completed_attempts(&student_id, &quiz_ids)
            .await?;
        for attempt in attempts {
            let Some(quiz) = course.quiz(attempt.quiz_id) else {
                continue;
            };
            let trigger = BadgeTrigger::QuizCompleted {
                course_id: course.id,
                score: attempt.score,
                max_marks: quiz.max_marks,
            };
            awards.extend(self.badges.apply_rules(student_id, trigger).await?);
        }
        Ok(())
    }

    async fn cascade_quiz(
        &self,
        attempt: QuizAttempt,
        course: &CourseOutline,
        max_marks: u32,
    ) -> Result<ActivityOutcome, Error> {
        let student_id = attempt.student_id;
        let course_stage = self.evaluator.cascade_course(student_id, course).await?;
        let course_progress = course_stage.value;

        let mut awards = self
            .badges
            .apply_rules(
                student_id,
                BadgeTrigger::QuizCompleted {
                    course_id: course.id,
                    score: attempt.score,
                    max_marks,
                },
            )
            .await?;
        awards.extend(course_stage.awards);
        self.refresh_if_granted(student_id, &awards).await?;

        info!(
            student_id = %student_id,
            quiz_id = %attempt.quiz_id,
            score = attempt.score,
            max_marks,
            course_progress = course_progress.value(),
            "completed quiz processed"
        );
        Ok(ActivityOutcome {
            course_progress,
            awards,
        })
    }

    async fn refresh_if_granted(
        &self,
        student_id: StudentId,
        awards: &[AwardOutcome],
    ) -> Result<(), Error> {
        if granted_count(awards) > 0 {
            self.profiles.refresh_student_profile(student_id).await?;
        }
        Ok(())
    }

    async fn require_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Enrollment, Error> {
        self.progress
            .find_enrollment(&student_id, &course_id)
            .await?
            .ok_or_else(|| enrollment_missing(student_id, course_id))
    }

    async fn course(&self, course_id: CourseId) -> Result<CourseOutline, Error> {
        self.catalog
            .find_course(&course_id)
            .await?
            .ok_or_else(|| course_not_found(course_id))
    }

    async fn course_containing(&self, item: CourseItem) -> Result<CourseOutline, Error> {
        self.catalog
            .find_course_containing(item)
            .await?
            .ok_or_else(|| item_not_found(item))
    }

    async fn quiz_course(&self, quiz_id: QuizId) -> Result<(CourseOutline, u32), Error> {
        let item = CourseItem::Quiz(quiz_id);
        let course = self.course_containing(item).await?;
        let max_marks = course
            .quiz(quiz_id)
            .map(|quiz| quiz.max_marks)
            .ok_or_else(|| item_not_found(item))?;
        Ok((course, max_marks))
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
