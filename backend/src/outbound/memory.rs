//! In-process adapter implementing every engine port.
//!
//! All state lives behind one mutex, so each port call is a single critical
//! section and the insert-if-absent operations are atomic. Used by tests that
//! exercise the whole pipeline without a database.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::activity::{AssignmentSubmission, QuizAnswer, QuizAttempt};
use crate::domain::badges::{AwardOutcome, Badge, BadgeDefinition, NewStudentBadge, StudentBadge};
use crate::domain::course::{CourseItem, CourseOutline};
use crate::domain::ids::{
    AssignmentId, AttemptId, BadgeId, CourseId, InstructorId, LessonId, ModuleId, QuestionId,
    QuizId, StudentId, SubmissionId,
};
use crate::domain::percentage::Percentage;
use crate::domain::ports::{
    ActivityRepository, ActivityRepositoryError, BadgeRepository, BadgeRepositoryError,
    CatalogEntry, CourseCatalog, CourseCatalogError, EnrollmentInsert, ProfileRepository,
    ProfileRepositoryError, ProgressRepository, ProgressRepositoryError,
};
use crate::domain::profiles::{InstructorProfile, StudentProfile};
use crate::domain::progress::{Enrollment, LessonProgress, ModuleProgress, ModuleProgressWrite};

const POISONED: &str = "in-memory store lock poisoned";

#[derive(Default)]
struct State {
    courses: Vec<CourseOutline>,
    enrollments: Vec<Enrollment>,
    lessons: HashMap<(StudentId, LessonId), LessonProgress>,
    modules: HashMap<(StudentId, ModuleId), ModuleProgress>,
    submissions: Vec<AssignmentSubmission>,
    attempts: Vec<QuizAttempt>,
    answers: HashMap<(AttemptId, QuestionId), QuizAnswer>,
    badges: Vec<Badge>,
    awards: Vec<StudentBadge>,
    student_profiles: HashMap<StudentId, StudentProfile>,
    instructor_profiles: HashMap<InstructorId, InstructorProfile>,
}

impl State {
    fn enrollment_mut(
        &mut self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Option<&mut Enrollment> {
        self.enrollments
            .iter_mut()
            .find(|e| e.student_id == *student_id && e.course_id == *course_id)
    }
}

/// Shared in-memory learning store.
#[derive(Default)]
pub struct InMemoryLearningStore {
    state: Mutex<State>,
}

impl InMemoryLearningStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a course outline.
    pub fn insert_course(&self, outline: CourseOutline) -> Result<(), CourseCatalogError> {
        let mut state = self.lock(CourseCatalogError::query)?;
        state.courses.retain(|course| course.id != outline.id);
        state.courses.push(outline);
        Ok(())
    }

    /// Number of stored enrollments for a student and course.
    pub fn enrollment_rows(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<usize, ProgressRepositoryError> {
        let state = self.lock(ProgressRepositoryError::query)?;
        Ok(state
            .enrollments
            .iter()
            .filter(|e| e.student_id == *student_id && e.course_id == *course_id)
            .count())
    }

    /// Number of stored answers for an attempt.
    pub fn answer_rows(&self, attempt_id: &AttemptId) -> Result<usize, ActivityRepositoryError> {
        let state = self.lock(ActivityRepositoryError::query)?;
        Ok(state
            .answers
            .keys()
            .filter(|(stored, _)| stored == attempt_id)
            .count())
    }

    fn lock<E>(&self, error: impl FnOnce(&'static str) -> E) -> Result<MutexGuard<'_, State>, E> {
        self.state.lock().map_err(|_| error(POISONED))
    }
}

fn scope_matches(award: &StudentBadge, candidate: &NewStudentBadge) -> bool {
    award.student_id == candidate.student_id
        && award.badge_id == candidate.badge_id
        && award.scope == candidate.scope
}

#[async_trait]
impl CourseCatalog for InMemoryLearningStore {
    async fn find_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Option<CourseOutline>, CourseCatalogError> {
        let state = self.lock(CourseCatalogError::query)?;
        Ok(state.courses.iter().find(|c| c.id == *course_id).cloned())
    }

    async fn find_course_containing(
        &self,
        item: CourseItem,
    ) -> Result<Option<CourseOutline>, CourseCatalogError> {
        let state = self.lock(CourseCatalogError::query)?;
        Ok(state.courses.iter().find(|c| c.contains(item)).cloned())
    }

    async fn list_courses_for_instructor(
        &self,
        instructor_id: &InstructorId,
    ) -> Result<Vec<CourseId>, CourseCatalogError> {
        let state = self.lock(CourseCatalogError::query)?;
        Ok(state
            .courses
            .iter()
            .filter(|c| c.instructor_id == *instructor_id)
            .map(|c| c.id)
            .collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryLearningStore {
    async fn insert_enrollment_if_absent(
        &self,
        enrollment: &Enrollment,
    ) -> Result<EnrollmentInsert, ProgressRepositoryError> {
        let mut state = self.lock(ProgressRepositoryError::query)?;
        if let Some(existing) = state.enrollment_mut(&enrollment.student_id, &enrollment.course_id)
        {
            return Ok(EnrollmentInsert {
                enrollment: existing.clone(),
                created: false,
            });
        }
        state.enrollments.push(enrollment.clone());
        Ok(EnrollmentInsert {
            enrollment: enrollment.clone(),
            created: true,
        })
    }

    async fn find_enrollment(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>, ProgressRepositoryError> {
        let mut state = self.lock(ProgressRepositoryError::query)?;
        Ok(state.enrollment_mut(student_id, course_id).cloned())
    }

    async fn update_enrollment_progress(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
        progress: Percentage,
    ) -> Result<Percentage, ProgressRepositoryError> {
        let mut state = self.lock(ProgressRepositoryError::query)?;
        let enrollment = state
            .enrollment_mut(student_id, course_id)
            .ok_or_else(|| ProgressRepositoryError::query("enrollment not found"))?;
        if progress > enrollment.progress {
            enrollment.progress = progress;
        }
        Ok(enrollment.progress)
    }

    async fn list_enrollments_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<Enrollment>, ProgressRepositoryError> {
        let state = self.lock(ProgressRepositoryError::query)?;
        Ok(state
            .enrollments
            .iter()
            .filter(|e| e.student_id == *student_id)
            .cloned()
            .collect())
    }

    async fn count_distinct_students(
        &self,
        course_ids: &[CourseId],
    ) -> Result<u64, ProgressRepositoryError> {
        let state = self.lock(ProgressRepositoryError::query)?;
        let students: HashSet<StudentId> = state
            .enrollments
            .iter()
            .filter(|e| course_ids.contains(&e.course_id))
            .map(|e| e.student_id)
            .collect();
        Ok(students.len() as u64)
    }

    async fn complete_lesson(
        &self,
        student_id: &StudentId,
        lesson_id: &LessonId,
        completed_at: DateTime<Utc>,
    ) -> Result<LessonProgress, ProgressRepositoryError> {
        let mut state = self.lock(ProgressRepositoryError::query)?;
        let row = state
            .lessons
            .entry((*student_id, *lesson_id))
            .or_insert_with(|| LessonProgress::pending(*student_id, *lesson_id));
        row.mark_complete(completed_at);
        Ok(row.clone())
    }

    async fn count_completed_lessons(
        &self,
        student_id: &StudentId,
        lesson_ids: &[LessonId],
    ) -> Result<u64, ProgressRepositoryError> {
        let state = self.lock(ProgressRepositoryError::query)?;
        let distinct: HashSet<&LessonId> = lesson_ids.iter().collect();
        Ok(distinct
            .into_iter()
            .filter(|lesson_id| {
                state
                    .lessons
                    .get(&(*student_id, **lesson_id))
                    .is_some_and(|row| row.is_completed)
            })
            .count() as u64)
    }

    async fn find_or_create_module_progress(
        &self,
        student_id: &StudentId,
        module_id: &ModuleId,
    ) -> Result<ModuleProgress, ProgressRepositoryError> {
        let mut state = self.lock(ProgressRepositoryError::query)?;
        Ok(state
            .modules
            .entry((*student_id, *module_id))
            .or_insert_with(|| ModuleProgress::pending(*student_id, *module_id))
            .clone())
    }

    async fn save_module_progress(
        &self,
        progress: &ModuleProgress,
    ) -> Result<ModuleProgressWrite, ProgressRepositoryError> {
        let mut state = self.lock(ProgressRepositoryError::query)?;
        let stored = state
            .modules
            .entry((progress.student_id, progress.module_id))
            .or_insert_with(|| ModuleProgress::pending(progress.student_id, progress.module_id));
        let completed_now = stored.merge(progress);
        Ok(ModuleProgressWrite {
            stored: stored.clone(),
            completed_now,
        })
    }

    async fn count_completed_modules(
        &self,
        student_id: &StudentId,
    ) -> Result<u64, ProgressRepositoryError> {
        let state = self.lock(ProgressRepositoryError::query)?;
        Ok(state
            .modules
            .values()
            .filter(|row| row.student_id == *student_id && row.is_completed)
            .count() as u64)
    }
}

#[async_trait]
impl ActivityRepository for InMemoryLearningStore {
    async fn find_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<AssignmentSubmission>, ActivityRepositoryError> {
        let state = self.lock(ActivityRepositoryError::query)?;
        Ok(state
            .submissions
            .iter()
            .find(|s| s.id == *submission_id)
            .cloned())
    }

    async fn save_submission(
        &self,
        submission: &AssignmentSubmission,
    ) -> Result<AssignmentSubmission, ActivityRepositoryError> {
        let mut state = self.lock(ActivityRepositoryError::query)?;
        let existing = state.submissions.iter_mut().find(|s| {
            s.assignment_id == submission.assignment_id && s.student_id == submission.student_id
        });
        match existing {
            Some(stored) => {
                if submission.marks.is_some() {
                    stored.marks = submission.marks;
                    stored.feedback = submission.feedback.clone();
                    stored.graded_at = submission.graded_at;
                }
                Ok(stored.clone())
            }
            None => {
                state.submissions.push(submission.clone());
                Ok(submission.clone())
            }
        }
    }

    async fn count_graded_submissions(
        &self,
        student_id: &StudentId,
        assignment_ids: &[AssignmentId],
    ) -> Result<u64, ActivityRepositoryError> {
        let graded = self
            .list_graded_submissions(student_id, assignment_ids)
            .await?;
        let distinct: HashSet<AssignmentId> = graded.iter().map(|s| s.assignment_id).collect();
        Ok(distinct.len() as u64)
    }

    async fn list_graded_submissions(
        &self,
        student_id: &StudentId,
        assignment_ids: &[AssignmentId],
    ) -> Result<Vec<AssignmentSubmission>, ActivityRepositoryError> {
        let state = self.lock(ActivityRepositoryError::query)?;
        Ok(state
            .submissions
            .iter()
            .filter(|s| {
                s.student_id == *student_id
                    && s.is_graded()
                    && assignment_ids.contains(&s.assignment_id)
            })
            .cloned()
            .collect())
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), ActivityRepositoryError> {
        let mut state = self.lock(ActivityRepositoryError::query)?;
        if state.attempts.iter().any(|a| a.id == attempt.id) {
            return Err(ActivityRepositoryError::query("attempt already exists"));
        }
        state.attempts.push(attempt.clone());
        Ok(())
    }

    async fn find_attempt(
        &self,
        attempt_id: &AttemptId,
    ) -> Result<Option<QuizAttempt>, ActivityRepositoryError> {
        let state = self.lock(ActivityRepositoryError::query)?;
        Ok(state.attempts.iter().find(|a| a.id == *attempt_id).cloned())
    }

    async fn list_attempts(
        &self,
        student_id: &StudentId,
        quiz_id: &QuizId,
    ) -> Result<Vec<QuizAttempt>, ActivityRepositoryError> {
        let state = self.lock(ActivityRepositoryError::query)?;
        let mut attempts: Vec<QuizAttempt> = state
            .attempts
            .iter()
            .filter(|a| a.student_id == *student_id && a.quiz_id == *quiz_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.started_at);
        Ok(attempts)
    }

    async fn save_answers(&self, answers: &[QuizAnswer]) -> Result<(), ActivityRepositoryError> {
        let mut state = self.lock(ActivityRepositoryError::query)?;
        for answer in answers {
            state
                .answers
                .entry((answer.attempt_id, answer.question_id))
                .or_insert(*answer);
        }
        Ok(())
    }

    async fn record_completed_attempt(
        &self,
        attempt: &QuizAttempt,
    ) -> Result<QuizAttempt, ActivityRepositoryError> {
        if !attempt.is_completed {
            return Err(ActivityRepositoryError::query("attempt is not completed"));
        }
        let mut state = self.lock(ActivityRepositoryError::query)?;
        if let Some(other) = state.attempts.iter().find(|a| {
            a.id != attempt.id
                && a.is_completed
                && a.quiz_id == attempt.quiz_id
                && a.student_id == attempt.student_id
        }) {
            return Err(ActivityRepositoryError::attempt_already_completed(other.id));
        }
        match state.attempts.iter_mut().find(|a| a.id == attempt.id) {
            Some(stored) if stored.is_completed => Ok(stored.clone()),
            Some(stored) => {
                *stored = attempt.clone();
                Ok(stored.clone())
            }
            None => {
                state.attempts.push(attempt.clone());
                Ok(attempt.clone())
            }
        }
    }

    async fn count_completed_quizzes(
        &self,
        student_id: &StudentId,
        quiz_ids: &[QuizId],
    ) -> Result<u64, ActivityRepositoryError> {
        let completed = self.list_completed_attempts(student_id, quiz_ids).await?;
        let distinct: HashSet<QuizId> = completed.iter().map(|a| a.quiz_id).collect();
        Ok(distinct.len() as u64)
    }

    async fn list_completed_attempts(
        &self,
        student_id: &StudentId,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizAttempt>, ActivityRepositoryError> {
        let state = self.lock(ActivityRepositoryError::query)?;
        Ok(state
            .attempts
            .iter()
            .filter(|a| {
                a.student_id == *student_id && a.is_completed && quiz_ids.contains(&a.quiz_id)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BadgeRepository for InMemoryLearningStore {
    async fn find_or_seed(
        &self,
        definition: &BadgeDefinition,
    ) -> Result<CatalogEntry, BadgeRepositoryError> {
        let mut state = self.lock(BadgeRepositoryError::query)?;
        if let Some(badge) = state
            .badges
            .iter()
            .find(|b| b.badge_type == definition.badge_type && b.name == definition.name)
        {
            return Ok(CatalogEntry {
                badge: badge.clone(),
                created: false,
            });
        }
        let badge = Badge {
            id: BadgeId::random(),
            badge_type: definition.badge_type,
            name: definition.name.to_owned(),
            description: definition.description.to_owned(),
            icon: definition.icon.to_owned(),
        };
        state.badges.push(badge.clone());
        Ok(CatalogEntry {
            badge,
            created: true,
        })
    }

    async fn find_badge(&self, badge_id: &BadgeId) -> Result<Option<Badge>, BadgeRepositoryError> {
        let state = self.lock(BadgeRepositoryError::query)?;
        Ok(state.badges.iter().find(|b| b.id == *badge_id).cloned())
    }

    async fn insert_award_if_absent(
        &self,
        award: &NewStudentBadge,
    ) -> Result<AwardOutcome, BadgeRepositoryError> {
        let mut state = self.lock(BadgeRepositoryError::query)?;
        if let Some(existing) = state.awards.iter().find(|a| scope_matches(a, award)) {
            return Ok(AwardOutcome::AlreadyHeld(existing.clone()));
        }
        let stored = StudentBadge::from(award.clone());
        state.awards.push(stored.clone());
        Ok(AwardOutcome::Granted(stored))
    }

    async fn list_awards_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<StudentBadge>, BadgeRepositoryError> {
        let state = self.lock(BadgeRepositoryError::query)?;
        Ok(state
            .awards
            .iter()
            .filter(|a| a.student_id == *student_id)
            .cloned()
            .collect())
    }

    async fn count_awards_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<u64, BadgeRepositoryError> {
        let state = self.lock(BadgeRepositoryError::query)?;
        Ok(state
            .awards
            .iter()
            .filter(|a| a.student_id == *student_id)
            .count() as u64)
    }

    async fn count_awards_by_instructor(
        &self,
        instructor_id: &InstructorId,
    ) -> Result<u64, BadgeRepositoryError> {
        let state = self.lock(BadgeRepositoryError::query)?;
        Ok(state
            .awards
            .iter()
            .filter(|a| a.is_instructor_awarded && a.awarded_by == Some(*instructor_id))
            .count() as u64)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryLearningStore {
    async fn save_student_profile(
        &self,
        profile: &StudentProfile,
    ) -> Result<(), ProfileRepositoryError> {
        let mut state = self.lock(ProfileRepositoryError::query)?;
        state
            .student_profiles
            .insert(profile.student_id, profile.clone());
        Ok(())
    }

    async fn find_student_profile(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<StudentProfile>, ProfileRepositoryError> {
        let state = self.lock(ProfileRepositoryError::query)?;
        Ok(state.student_profiles.get(student_id).cloned())
    }

    async fn save_instructor_profile(
        &self,
        profile: &InstructorProfile,
    ) -> Result<(), ProfileRepositoryError> {
        let mut state = self.lock(ProfileRepositoryError::query)?;
        state
            .instructor_profiles
            .insert(profile.instructor_id, profile.clone());
        Ok(())
    }

    async fn find_instructor_profile(
        &self,
        instructor_id: &InstructorId,
    ) -> Result<Option<InstructorProfile>, ProfileRepositoryError> {
        let state = self.lock(ProfileRepositoryError::query)?;
        Ok(state.instructor_profiles.get(instructor_id).cloned())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
