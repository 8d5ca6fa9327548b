//! Diesel table definitions for the progress schema.
//!
//! Must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Authored courses, one owner each.
    courses (id) {
        id -> Uuid,
        /// Owning instructor.
        instructor_id -> Uuid,
        title -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Ordered modules within a course.
    course_modules (id) {
        id -> Uuid,
        course_id -> Uuid,
        title -> Text,
        /// Sort key within the course.
        position -> Int4,
    }
}

diesel::table! {
    /// Ordered lessons within a module.
    lessons (id) {
        id -> Uuid,
        module_id -> Uuid,
        position -> Int4,
    }
}

diesel::table! {
    /// Graded assignments attached to a course.
    assignments (id) {
        id -> Uuid,
        course_id -> Uuid,
        title -> Text,
        max_marks -> Int4,
        position -> Int4,
    }
}

diesel::table! {
    /// Quizzes attached to a course.
    quizzes (id) {
        id -> Uuid,
        course_id -> Uuid,
        title -> Text,
        max_marks -> Int4,
        pass_marks -> Int4,
        position -> Int4,
    }
}

diesel::table! {
    /// Multiple-choice questions within a quiz.
    quiz_questions (id) {
        id -> Uuid,
        quiz_id -> Uuid,
        /// One of `A`, `B`, `C` or `D`.
        correct_option -> Text,
        marks -> Int4,
        position -> Int4,
    }
}

diesel::table! {
    /// Student enrollments with cached course progress.
    enrollments (student_id, course_id) {
        student_id -> Uuid,
        course_id -> Uuid,
        /// Course completion percentage in `[0, 100]`.
        progress -> Float8,
        enrolled_at -> Timestamptz,
    }
}

diesel::table! {
    /// Per-student lesson completion.
    lesson_progress (student_id, lesson_id) {
        student_id -> Uuid,
        lesson_id -> Uuid,
        is_completed -> Bool,
        /// Set on the first completion and never moved afterwards.
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Per-student module completion.
    module_progress (student_id, module_id) {
        student_id -> Uuid,
        module_id -> Uuid,
        completion_percentage -> Float8,
        /// Sticky once set.
        is_completed -> Bool,
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Latest submission per student and assignment.
    assignment_submissions (id) {
        id -> Uuid,
        assignment_id -> Uuid,
        student_id -> Uuid,
        /// `NULL` until graded.
        marks -> Nullable<Int4>,
        feedback -> Nullable<Text>,
        submitted_at -> Timestamptz,
        graded_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Quiz attempts. At most one completed attempt per student and quiz.
    quiz_attempts (id) {
        id -> Uuid,
        quiz_id -> Uuid,
        student_id -> Uuid,
        score -> Int4,
        is_completed -> Bool,
        started_at -> Timestamptz,
        submitted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Graded answers, one per attempt and question.
    quiz_answers (attempt_id, question_id) {
        attempt_id -> Uuid,
        question_id -> Uuid,
        selected_option -> Text,
        is_correct -> Bool,
    }
}

diesel::table! {
    /// Badge catalog keyed by `(badge_type, name)`.
    badges (id) {
        id -> Uuid,
        /// Stable snake_case badge type.
        badge_type -> Text,
        name -> Text,
        description -> Text,
        icon -> Text,
    }
}

diesel::table! {
    /// Badge awards. Unique per student, badge and scope.
    student_badges (id) {
        id -> Uuid,
        student_id -> Uuid,
        badge_id -> Uuid,
        course_id -> Uuid,
        /// Set only for module-scoped awards.
        module_id -> Nullable<Uuid>,
        awarded_at -> Timestamptz,
        /// Instructor who granted the badge by hand.
        awarded_by -> Nullable<Uuid>,
        is_instructor_awarded -> Bool,
        note -> Nullable<Text>,
    }
}

diesel::table! {
    /// Student rollups, recomputed on demand.
    student_profiles (student_id) {
        student_id -> Uuid,
        courses_enrolled -> Int8,
        courses_completed -> Int8,
        modules_completed -> Int8,
        badges_earned -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Instructor rollups, recomputed on demand.
    instructor_profiles (instructor_id) {
        instructor_id -> Uuid,
        courses_created -> Int8,
        students -> Int8,
        badges_awarded -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(course_modules -> courses (course_id));
diesel::joinable!(lessons -> course_modules (module_id));
diesel::joinable!(assignments -> courses (course_id));
diesel::joinable!(quizzes -> courses (course_id));
diesel::joinable!(quiz_questions -> quizzes (quiz_id));
diesel::joinable!(enrollments -> courses (course_id));
diesel::joinable!(student_badges -> badges (badge_id));

diesel::allow_tables_to_appear_in_same_query!(
    courses,
    course_modules,
    lessons,
    assignments,
    quizzes,
    quiz_questions,
    enrollments,
    lesson_progress,
    module_progress,
    assignment_submissions,
    quiz_attempts,
    quiz_answers,
    badges,
    student_badges,
    student_profiles,
    instructor_profiles,
);
