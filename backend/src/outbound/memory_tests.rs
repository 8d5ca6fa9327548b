//! Tests for the in-memory store's atomicity guarantees.

use rstest::{fixture, rstest};

use super::*;
use crate::domain::badges::{AwardOrigin, BadgeScope};
use crate::domain::ids::AwardId;
use crate::test_support::{CourseBuilder, fixture_time};

#[fixture]
fn store() -> InMemoryLearningStore {
    InMemoryLearningStore::new()
}

fn submission(student_id: StudentId, assignment_id: AssignmentId) -> AssignmentSubmission {
    AssignmentSubmission {
        id: SubmissionId::random(),
        assignment_id,
        student_id,
        marks: None,
        feedback: None,
        submitted_at: fixture_time(),
        graded_at: None,
    }
}

#[rstest]
#[tokio::test]
async fn enrollment_insert_keeps_first_row(store: InMemoryLearningStore) {
    let student_id = StudentId::random();
    let course_id = CourseId::random();
    let first = Enrollment::new(student_id, course_id, fixture_time());
    let mut second = first.clone();
    second.enrolled_at = fixture_time() + chrono::Duration::minutes(1);

    let created = store
        .insert_enrollment_if_absent(&first)
        .await
        .expect("insert succeeds");
    let repeat = store
        .insert_enrollment_if_absent(&second)
        .await
        .expect("insert succeeds");

    assert!(created.created);
    assert!(!repeat.created);
    assert_eq!(repeat.enrollment.enrolled_at, first.enrolled_at);
    assert_eq!(
        store
            .enrollment_rows(&student_id, &course_id)
            .expect("count succeeds"),
        1
    );
}

#[rstest]
#[tokio::test]
async fn completing_a_lesson_twice_keeps_timestamp(store: InMemoryLearningStore) {
    let student_id = StudentId::random();
    let lesson_id = LessonId::random();

    store
        .complete_lesson(&student_id, &lesson_id, fixture_time())
        .await
        .expect("first completion");
    let again = store
        .complete_lesson(
            &student_id,
            &lesson_id,
            fixture_time() + chrono::Duration::hours(2),
        )
        .await
        .expect("second completion");

    assert_eq!(again.completed_at, Some(fixture_time()));
    let counted = store
        .count_completed_lessons(&student_id, &[lesson_id, lesson_id])
        .await
        .expect("count succeeds");
    assert_eq!(counted, 1);
}

#[rstest]
#[tokio::test]
async fn saving_ungraded_submission_never_clears_marks(store: InMemoryLearningStore) {
    let student_id = StudentId::random();
    let assignment_id = AssignmentId::random();
    let mut graded = submission(student_id, assignment_id);
    graded.marks = Some(70);
    graded.graded_at = Some(fixture_time());

    store.save_submission(&graded).await.expect("save graded");
    let stored = store
        .save_submission(&submission(student_id, assignment_id))
        .await
        .expect("save ungraded");

    assert_eq!(stored.id, graded.id);
    assert_eq!(stored.marks, Some(70));
}

#[rstest]
#[tokio::test]
async fn second_completed_attempt_is_rejected(store: InMemoryLearningStore) {
    let student_id = StudentId::random();
    let quiz_id = QuizId::random();
    let first = QuizAttempt::start(quiz_id, student_id, fixture_time()).complete(5, fixture_time());
    let second =
        QuizAttempt::start(quiz_id, student_id, fixture_time()).complete(9, fixture_time());

    store
        .record_completed_attempt(&first)
        .await
        .expect("first completion");
    let replay = store
        .record_completed_attempt(&first)
        .await
        .expect("replay is idempotent");
    let err = store
        .record_completed_attempt(&second)
        .await
        .expect_err("second attempt rejected");

    assert_eq!(replay.score, 5);
    assert_eq!(
        err,
        ActivityRepositoryError::AttemptAlreadyCompleted {
            attempt_id: first.id
        }
    );
}

#[rstest]
#[tokio::test]
async fn awards_are_unique_per_scope(store: InMemoryLearningStore) {
    let entry = store
        .find_or_seed(&BadgeDefinition::MODULE_COMPLETION)
        .await
        .expect("seed succeeds");
    let student_id = StudentId::random();
    let course_id = CourseId::random();
    let award = |module_id| NewStudentBadge {
        id: AwardId::random(),
        student_id,
        badge_id: entry.badge.id,
        scope: BadgeScope::Module {
            course_id,
            module_id,
        },
        awarded_at: fixture_time(),
        origin: AwardOrigin::Automatic,
    };
    let module_a = ModuleId::random();

    let first = store
        .insert_award_if_absent(&award(module_a))
        .await
        .expect("award succeeds");
    let repeat = store
        .insert_award_if_absent(&award(module_a))
        .await
        .expect("award succeeds");
    let other_module = store
        .insert_award_if_absent(&award(ModuleId::random()))
        .await
        .expect("award succeeds");

    assert!(first.is_granted());
    assert_eq!(repeat, AwardOutcome::AlreadyHeld(first.award().clone()));
    assert!(other_module.is_granted());
    assert_eq!(
        store
            .count_awards_for_student(&student_id)
            .await
            .expect("count succeeds"),
        2
    );
}

#[rstest]
#[tokio::test]
async fn catalog_lookup_by_contained_item(store: InMemoryLearningStore) {
    let course = CourseBuilder::new(InstructorId::random())
        .module(2)
        .quiz(&[10])
        .build();
    let quiz_id = course.quizzes[0].id;
    store.insert_course(course.clone()).expect("insert course");

    let found = store
        .find_course_containing(CourseItem::Quiz(quiz_id))
        .await
        .expect("lookup succeeds");

    assert_eq!(found.map(|c| c.id), Some(course.id));
}

#[rstest]
#[tokio::test]
async fn stale_module_write_keeps_completion(store: InMemoryLearningStore) {
    let student_id = StudentId::random();
    let module_id = ModuleId::random();
    let pending = store
        .find_or_create_module_progress(&student_id, &module_id)
        .await
        .expect("row created");
    let mut stale = pending.clone();
    let mut fresh = pending;
    stale.apply(1, 2, fixture_time());
    fresh.apply(2, 2, fixture_time());

    let completed = store
        .save_module_progress(&fresh)
        .await
        .expect("save succeeds");
    let overwritten = store
        .save_module_progress(&stale)
        .await
        .expect("save succeeds");

    assert!(completed.completed_now);
    assert!(!overwritten.completed_now);
    assert!(overwritten.stored.is_completed);
    assert_eq!(overwritten.stored.completion_percentage, Percentage::FULL);
    assert_eq!(overwritten.stored.completed_at, Some(fixture_time()));
}

#[rstest]
#[tokio::test]
async fn enrollment_progress_never_drops(store: InMemoryLearningStore) {
    let enrollment = Enrollment::new(StudentId::random(), CourseId::random(), fixture_time());
    store
        .insert_enrollment_if_absent(&enrollment)
        .await
        .expect("insert succeeds");
    let high = Percentage::try_new(75.0).expect("in range");
    let low = Percentage::try_new(50.0).expect("in range");

    let raised = store
        .update_enrollment_progress(&enrollment.student_id, &enrollment.course_id, high)
        .await
        .expect("update succeeds");
    let kept = store
        .update_enrollment_progress(&enrollment.student_id, &enrollment.course_id, low)
        .await
        .expect("update succeeds");

    assert_eq!(raised, high);
    assert_eq!(kept, high);
}
