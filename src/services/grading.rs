//! Pure scoring of multiple-choice attempts.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::db::models::Question;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmittedAnswer {
    #[serde(alias = "question_id")]
    pub(crate) question_id: String,
    #[serde(alias = "selected_option")]
    pub(crate) selected_option: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradedAnswer {
    pub(crate) question_id: String,
    pub(crate) selected_option: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradeOutcome {
    pub(crate) answers: Vec<GradedAnswer>,
    pub(crate) correct_count: usize,
    pub(crate) total_questions: usize,
    /// Unrounded percentage in `0.0..=100.0`.
    pub(crate) score: f64,
    pub(crate) is_passed: bool,
}

/// Grades `submitted` against the exam's question set.
///
/// * answers for questions outside `questions` are ignored;
/// * only the first answer per question counts;
/// * unanswered questions stay in the denominator;
/// * an empty exam scores `0.0`.
pub(crate) fn grade(
    questions: &[Question],
    submitted: &[SubmittedAnswer],
    passing_score: i32,
) -> GradeOutcome {
    let by_id: HashMap<&str, &Question> =
        questions.iter().map(|question| (question.id.as_str(), question)).collect();
    let mut answered = HashSet::new();
    let mut answers = Vec::with_capacity(submitted.len().min(questions.len()));

    for answer in submitted {
        let Some(question) = by_id.get(answer.question_id.as_str()) else {
            continue;
        };
        if !answered.insert(answer.question_id.as_str()) {
            continue;
        }

        let is_correct = question
            .correct_option()
            .is_some_and(|key| key.text == answer.selected_option);

        answers.push(GradedAnswer {
            question_id: answer.question_id.clone(),
            selected_option: answer.selected_option.clone(),
            is_correct,
        });
    }

    let correct_count = answers.iter().filter(|answer| answer.is_correct).count();
    let total_questions = questions.len();
    let score = score_percentage(correct_count, total_questions);

    GradeOutcome {
        answers,
        correct_count,
        total_questions,
        score,
        is_passed: is_passing(score, passing_score),
    }
}

pub(crate) fn score_percentage(correct_count: usize, total_questions: usize) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    // Multiply first: whole-number percentages then come out exact.
    (100.0 * correct_count as f64) / total_questions as f64
}

pub(crate) fn is_passing(score: f64, passing_score: i32) -> bool {
    score >= f64::from(passing_score)
}
