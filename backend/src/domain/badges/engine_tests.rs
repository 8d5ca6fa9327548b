//! Tests for badge awarding and catalog seeding.

use std::sync::Arc;

use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::course::CourseOutline;
use crate::domain::ports::ProfileRepository;
use crate::domain::progress::Enrollment;
use crate::outbound::memory::InMemoryLearningStore;
use crate::test_support::{CourseBuilder, MutableClock, fixture_time};

struct World {
    store: Arc<InMemoryLearningStore>,
    engine: BadgeEngine,
    course: CourseOutline,
    student_id: StudentId,
}

impl World {
    fn instructor_id(&self) -> InstructorId {
        self.course.instructor_id
    }

    async fn enroll(&self) {
        self.store
            .insert_enrollment_if_absent(&Enrollment::new(
                self.student_id,
                self.course.id,
                fixture_time(),
            ))
            .await
            .expect("enrollment stored");
    }

    async fn quiz_master_id(&self) -> BadgeId {
        self.engine
            .catalog_entry(&BadgeDefinition::QUIZ_MASTER)
            .await
            .expect("catalog entry")
            .id
    }

    fn manual_award(&self, badge_id: BadgeId) -> InstructorAward {
        InstructorAward {
            instructor_id: self.instructor_id(),
            student_id: self.student_id,
            course_id: self.course.id,
            badge_id,
            note: Some("Great questions in class".to_owned()),
        }
    }
}

#[fixture]
fn world() -> World {
    let store = Arc::new(InMemoryLearningStore::new());
    let course = CourseBuilder::new(InstructorId::random()).module(1).build();
    store.insert_course(course.clone()).expect("course stored");
    let ports = EnginePorts::from_store(store.clone());
    World {
        engine: BadgeEngine::new(&ports, Arc::new(MutableClock::default())),
        store,
        course,
        student_id: StudentId::random(),
    }
}

#[rstest]
#[tokio::test]
async fn seeding_is_idempotent(world: World) {
    let first = world.engine.seed_catalog().await.expect("seed succeeds");
    let second = world.engine.seed_catalog().await.expect("seed succeeds");

    assert_eq!(first, CANONICAL_BADGES.len());
    assert_eq!(second, 0);
}

#[rstest]
#[tokio::test]
async fn catalog_entry_reuses_seeded_badge(world: World) {
    world.engine.seed_catalog().await.expect("seed succeeds");

    let badge = world
        .engine
        .catalog_entry(&BadgeDefinition::PERFECT_SCORE)
        .await
        .expect("catalog entry");
    let again = world
        .engine
        .catalog_entry(&BadgeDefinition::PERFECT_SCORE)
        .await
        .expect("catalog entry");

    assert_eq!(badge.id, again.id);
    assert_eq!(badge.icon, "💯");
}

#[rstest]
#[tokio::test]
async fn repeat_grant_is_already_held_and_refreshes_once(world: World) {
    let scope = BadgeScope::Course {
        course_id: world.course.id,
    };

    let first = world
        .engine
        .grant_if_eligible(
            world.student_id,
            &BadgeDefinition::COURSE_COMPLETION,
            scope,
            AwardOrigin::Automatic,
        )
        .await
        .expect("grant succeeds");
    let second = world
        .engine
        .grant_if_eligible(
            world.student_id,
            &BadgeDefinition::COURSE_COMPLETION,
            scope,
            AwardOrigin::Automatic,
        )
        .await
        .expect("grant succeeds");

    assert!(first.is_granted());
    assert_eq!(second, AwardOutcome::AlreadyHeld(first.award().clone()));
    let profile = world
        .store
        .find_student_profile(&world.student_id)
        .await
        .expect("lookup succeeds")
        .expect("profile created on grant");
    assert_eq!(profile.badges_earned, 1);
}

#[rstest]
#[tokio::test]
async fn apply_rules_awards_every_matching_badge(world: World) {
    let outcomes = world
        .engine
        .apply_rules(
            world.student_id,
            BadgeTrigger::QuizCompleted {
                course_id: world.course.id,
                score: 20,
                max_marks: 20,
            },
        )
        .await
        .expect("rules apply");

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(AwardOutcome::is_granted));
}

#[rstest]
#[tokio::test]
async fn instructor_award_records_origin_and_refreshes_both_profiles(world: World) {
    world.enroll().await;
    let badge_id = world.quiz_master_id().await;

    let outcome = world
        .engine
        .award_by_instructor(world.manual_award(badge_id))
        .await
        .expect("award succeeds");
    let repeat = world
        .engine
        .award_by_instructor(world.manual_award(badge_id))
        .await
        .expect("award succeeds");

    let award = outcome.award();
    assert!(outcome.is_granted());
    assert!(award.is_instructor_awarded);
    assert_eq!(award.awarded_by, Some(world.instructor_id()));
    assert_eq!(award.note.as_deref(), Some("Great questions in class"));
    assert!(!repeat.is_granted());

    let instructor = world
        .store
        .find_instructor_profile(&world.instructor_id())
        .await
        .expect("lookup succeeds")
        .expect("instructor profile created");
    assert_eq!(instructor.badges_awarded, 1);
    assert_eq!(instructor.students, 1);
}

#[rstest]
#[tokio::test]
async fn instructor_must_teach_the_course(world: World) {
    world.enroll().await;
    let badge_id = world.quiz_master_id().await;
    let mut request = world.manual_award(badge_id);
    request.instructor_id = InstructorId::random();

    let err = world
        .engine
        .award_by_instructor(request)
        .await
        .expect_err("foreign instructor rejected");

    assert_eq!(err.code(), ErrorCode::PreconditionFailed);
    let details = err.details().expect("details present");
    assert_eq!(details["code"], "not_course_instructor");
}

#[rstest]
#[tokio::test]
async fn manual_award_requires_enrollment(world: World) {
    let badge_id = world.quiz_master_id().await;

    let err = world
        .engine
        .award_by_instructor(world.manual_award(badge_id))
        .await
        .expect_err("student not enrolled");

    assert_eq!(err.code(), ErrorCode::PreconditionFailed);
}

#[rstest]
#[tokio::test]
async fn manual_award_of_unknown_badge_is_not_found(world: World) {
    world.enroll().await;

    let err = world
        .engine
        .award_by_instructor(world.manual_award(BadgeId::random()))
        .await
        .expect_err("badge unknown");

    assert_eq!(err.code(), ErrorCode::NotFound);
}
