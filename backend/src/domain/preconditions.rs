//! Shared constructors for the engine's recurring errors.

use serde_json::json;

use crate::domain::Error;
use crate::domain::course::CourseItem;
use crate::domain::ids::{CourseId, StudentId};

pub(crate) fn enrollment_missing(student_id: StudentId, course_id: CourseId) -> Error {
    Error::precondition_failed(format!(
        "student {student_id} is not enrolled in course {course_id}"
    ))
    .with_details(json!({
        "code": "enrollment_missing",
        "studentId": student_id,
        "courseId": course_id,
    }))
}

pub(crate) fn course_not_found(course_id: CourseId) -> Error {
    Error::not_found(format!("course {course_id} not found"))
}

pub(crate) fn item_not_found(item: CourseItem) -> Error {
    Error::not_found(format!("{item} not found"))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ids::LessonId;

    #[rstest]
    fn enrollment_missing_carries_ids() {
        let student_id = StudentId::random();
        let course_id = CourseId::random();

        let err = enrollment_missing(student_id, course_id);

        assert_eq!(err.code(), ErrorCode::PreconditionFailed);
        let details = err.details().expect("details present");
        assert_eq!(details["code"], json!("enrollment_missing"));
        assert_eq!(details["courseId"], json!(course_id.to_string()));
    }

    #[rstest]
    fn item_not_found_names_the_item() {
        let lesson = LessonId::random();
        let err = item_not_found(CourseItem::Lesson(lesson));
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(err.message().contains(&lesson.to_string()));
    }
}
