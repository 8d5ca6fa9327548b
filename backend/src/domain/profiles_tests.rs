//! Tests for profile recomputation.

use std::sync::Arc;

use chrono::TimeZone;
use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::ids::CourseId;
use crate::domain::percentage::Percentage;
use crate::domain::ports::{
    MockActivityRepository, MockBadgeRepository, MockCourseCatalog, MockProfileRepository,
    MockProgressRepository, ProgressRepositoryError,
};
use crate::domain::progress::Enrollment;
use crate::test_support::MutableClock;

#[fixture]
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

struct Mocks {
    catalog: MockCourseCatalog,
    progress: MockProgressRepository,
    badges: MockBadgeRepository,
    profiles: MockProfileRepository,
}

impl Mocks {
    fn new() -> Self {
        Self {
            catalog: MockCourseCatalog::new(),
            progress: MockProgressRepository::new(),
            badges: MockBadgeRepository::new(),
            profiles: MockProfileRepository::new(),
        }
    }

    fn into_aggregator(self, now: DateTime<Utc>) -> ProfileAggregator {
        let ports = EnginePorts::new(
            Arc::new(self.catalog),
            Arc::new(self.progress),
            Arc::new(MockActivityRepository::new()),
            Arc::new(self.badges),
            Arc::new(self.profiles),
        );
        ProfileAggregator::new(&ports, Arc::new(MutableClock::new(now)))
    }
}

fn enrollment(student_id: StudentId, progress: f64, now: DateTime<Utc>) -> Enrollment {
    let mut enrollment = Enrollment::new(student_id, CourseId::random(), now);
    enrollment.progress = Percentage::try_new(progress).expect("valid percentage");
    enrollment
}

#[rstest]
#[tokio::test]
async fn student_profile_counts_every_fact(now: DateTime<Utc>) {
    let student_id = StudentId::random();
    let mut mocks = Mocks::new();
    mocks
        .progress
        .expect_list_enrollments_for_student()
        .with(eq(student_id))
        .times(1)
        .return_once(move |_| {
            Ok(vec![
                enrollment(student_id, 100.0, now),
                enrollment(student_id, 40.0, now),
                enrollment(student_id, 99.99, now),
            ])
        });
    mocks
        .progress
        .expect_count_completed_modules()
        .times(1)
        .return_once(|_| Ok(4));
    mocks
        .badges
        .expect_count_awards_for_student()
        .times(1)
        .return_once(|_| Ok(7));
    mocks
        .profiles
        .expect_save_student_profile()
        .withf(move |profile| {
            profile.student_id == student_id
                && profile.courses_enrolled == 3
                && profile.courses_completed == 1
        })
        .times(1)
        .return_once(|_| Ok(()));

    let profile = mocks
        .into_aggregator(now)
        .refresh_student_profile(student_id)
        .await
        .expect("refresh succeeds");

    assert_eq!(
        profile,
        StudentProfile {
            student_id,
            courses_enrolled: 3,
            courses_completed: 1,
            modules_completed: 4,
            badges_earned: 7,
            updated_at: now,
        }
    );
}

#[rstest]
#[tokio::test]
async fn instructor_profile_counts_distinct_students(now: DateTime<Utc>) {
    let instructor_id = InstructorId::random();
    let courses = vec![CourseId::random(), CourseId::random()];
    let expected_courses = courses.clone();
    let mut mocks = Mocks::new();
    mocks
        .catalog
        .expect_list_courses_for_instructor()
        .with(eq(instructor_id))
        .return_once(move |_| Ok(courses));
    mocks
        .progress
        .expect_count_distinct_students()
        .withf(move |ids| ids.to_vec() == expected_courses)
        .return_once(|_| Ok(12));
    mocks
        .badges
        .expect_count_awards_by_instructor()
        .return_once(|_| Ok(3));
    mocks
        .profiles
        .expect_save_instructor_profile()
        .times(1)
        .return_once(|_| Ok(()));

    let profile = mocks
        .into_aggregator(now)
        .refresh_instructor_profile(instructor_id)
        .await
        .expect("refresh succeeds");

    assert_eq!(profile.courses_created, 2);
    assert_eq!(profile.students, 12);
    assert_eq!(profile.badges_awarded, 3);
}

#[rstest]
#[case(ProgressRepositoryError::connection("refused"), ErrorCode::ServiceUnavailable)]
#[case(ProgressRepositoryError::query("syntax"), ErrorCode::InternalError)]
#[tokio::test]
async fn store_failures_map_to_domain_codes(
    now: DateTime<Utc>,
    #[case] failure: ProgressRepositoryError,
    #[case] expected: ErrorCode,
) {
    let mut mocks = Mocks::new();
    mocks
        .progress
        .expect_list_enrollments_for_student()
        .return_once(move |_| Err(failure));
    mocks.profiles.expect_save_student_profile().never();

    let err = mocks
        .into_aggregator(now)
        .refresh_student_profile(StudentId::random())
        .await
        .expect_err("store failure propagates");

    assert_eq!(err.code(), expected);
}
