//! Assignment submissions, quiz attempts and answer grading.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::course::{AnswerOption, QuizOutline};
use super::ids::{AssignmentId, AttemptId, QuestionId, QuizId, StudentId, SubmissionId};

/// A student's work for an assignment.
///
/// Unique per `(assignment_id, student_id)`. `marks` of `None` means the
/// submission is still waiting for a grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSubmission {
    pub id: SubmissionId,
    pub assignment_id: AssignmentId,
    pub student_id: StudentId,
    pub marks: Option<u32>,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl AssignmentSubmission {
    /// Whether a grade has been recorded.
    pub fn is_graded(&self) -> bool {
        self.marks.is_some()
    }
}

/// A single attempt at a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub student_id: StudentId,
    pub score: u32,
    pub is_completed: bool,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl QuizAttempt {
    /// Open a new attempt.
    pub fn start(quiz_id: QuizId, student_id: StudentId, started_at: DateTime<Utc>) -> Self {
        Self {
            id: AttemptId::random(),
            quiz_id,
            student_id,
            score: 0,
            is_completed: false,
            started_at,
            submitted_at: None,
        }
    }

    /// Close the attempt with its final score.
    pub fn complete(mut self, score: u32, submitted_at: DateTime<Utc>) -> Self {
        self.score = score;
        self.is_completed = true;
        self.submitted_at = Some(submitted_at);
        self
    }
}

/// The option a student picked for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub selected: AnswerOption,
}

/// A graded answer, immutable once stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub attempt_id: AttemptId,
    pub question_id: QuestionId,
    pub selected: AnswerOption,
    pub is_correct: bool,
}

/// Result of grading a set of answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswers {
    pub score: u32,
    pub answers: Vec<QuizAnswer>,
}

/// Grade `submitted` answers against the quiz's answer key.
///
/// Answers to questions outside the quiz are ignored, only the first answer
/// per question counts, and unanswered questions score nothing.
pub fn grade_answers(
    quiz: &QuizOutline,
    attempt_id: AttemptId,
    submitted: &[AnswerSubmission],
) -> GradedAnswers {
    let mut selections: HashMap<QuestionId, AnswerOption> = HashMap::new();
    for answer in submitted {
        selections
            .entry(answer.question_id)
            .or_insert(answer.selected);
    }

    let mut score = 0_u32;
    let mut answers = Vec::with_capacity(selections.len());
    for question in &quiz.questions {
        let Some(&selected) = selections.get(&question.id) else {
            continue;
        };
        let is_correct = selected == question.correct_option;
        if is_correct {
            score = score.saturating_add(question.marks);
        }
        answers.push(QuizAnswer {
            attempt_id,
            question_id: question.id,
            selected,
            is_correct,
        });
    }

    GradedAnswers { score, answers }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for quiz grading.
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::course::QuestionOutline;

    #[fixture]
    fn quiz() -> QuizOutline {
        QuizOutline {
            id: QuizId::random(),
            title: "Lifetimes".to_owned(),
            max_marks: 10,
            pass_marks: 6,
            questions: vec![
                QuestionOutline {
                    id: QuestionId::random(),
                    correct_option: AnswerOption::A,
                    marks: 4,
                },
                QuestionOutline {
                    id: QuestionId::random(),
                    correct_option: AnswerOption::C,
                    marks: 6,
                },
            ],
        }
    }

    fn answer(question_id: QuestionId, selected: AnswerOption) -> AnswerSubmission {
        AnswerSubmission {
            question_id,
            selected,
        }
    }

    #[rstest]
    fn scores_correct_answers_by_marks(quiz: QuizOutline) {
        let submitted = [
            answer(quiz.questions[0].id, AnswerOption::A),
            answer(quiz.questions[1].id, AnswerOption::B),
        ];

        let graded = grade_answers(&quiz, AttemptId::random(), &submitted);

        assert_eq!(graded.score, 4);
        assert_eq!(graded.answers.len(), 2);
        assert!(graded.answers[0].is_correct);
        assert!(!graded.answers[1].is_correct);
    }

    #[rstest]
    fn unanswered_and_foreign_questions_score_nothing(quiz: QuizOutline) {
        let submitted = [answer(QuestionId::random(), AnswerOption::A)];

        let graded = grade_answers(&quiz, AttemptId::random(), &submitted);

        assert_eq!(graded.score, 0);
        assert!(graded.answers.is_empty());
    }

    #[rstest]
    fn first_answer_per_question_wins(quiz: QuizOutline) {
        let question = quiz.questions[1].id;
        let submitted = [
            answer(question, AnswerOption::C),
            answer(question, AnswerOption::D),
        ];

        let graded = grade_answers(&quiz, AttemptId::random(), &submitted);

        assert_eq!(graded.score, 6);
        assert_eq!(graded.answers.len(), 1);
    }

    #[rstest]
    fn completing_attempt_records_score(quiz: QuizOutline) {
        let started = Utc::now();
        let attempt = QuizAttempt::start(quiz.id, StudentId::random(), started);

        let done = attempt.complete(10, started);

        assert!(done.is_completed);
        assert_eq!(done.score, 10);
        assert_eq!(done.submitted_at, Some(started));
    }
}
