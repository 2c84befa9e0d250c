//! Admission gate for questions, applied to authored and generated questions alike.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::db::models::QuestionOption;
use crate::db::types::{DifficultyLevel, QuestionType};

pub(crate) const MIN_QUESTION_TEXT_LEN: usize = 5;
pub(crate) const GENERATED_OPTION_COUNT: usize = 4;
const TRUE_FALSE_OPTION_COUNT: usize = 2;

/// A question that has not been admitted to storage yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionDraft {
    pub(crate) text: String,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) explanation: Option<String>,
    pub(crate) options: Vec<QuestionOption>,
}

impl QuestionDraft {
    /// Trims every text field; a blank explanation becomes `None`.
    pub(crate) fn normalized(self) -> Self {
        Self {
            text: self.text.trim().to_string(),
            question_type: self.question_type,
            difficulty: self.difficulty,
            explanation: self
                .explanation
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            options: self
                .options
                .into_iter()
                .map(|option| QuestionOption {
                    text: option.text.trim().to_string(),
                    is_correct: option.is_correct,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub(crate) enum ContractViolation {
    TextTooShort { min: usize, actual: usize },
    NoOptions,
    EmptyOptionText { index: usize },
    DuplicateOptionText { text: String },
    NoCorrectOption,
    MultipleCorrectOptions { count: usize },
    WrongOptionCount { expected: usize, actual: usize },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextTooShort { min, actual } => {
                write!(f, "question text must be at least {min} characters (got {actual})")
            }
            Self::NoOptions => f.write_str("question must have at least one option"),
            Self::EmptyOptionText { index } => write!(f, "option {index} has empty text"),
            Self::DuplicateOptionText { text } => write!(f, "option text '{text}' is repeated"),
            Self::NoCorrectOption => f.write_str("exactly one option must be marked correct (none is)"),
            Self::MultipleCorrectOptions { count } => {
                write!(f, "exactly one option must be marked correct ({count} are)")
            }
            Self::WrongOptionCount { expected, actual } => {
                write!(f, "expected {expected} options, got {actual}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("question contract violated: {}", join_violations(.violations))]
pub(crate) struct ContractError {
    pub(crate) violations: Vec<ContractViolation>,
}

fn join_violations(violations: &[ContractViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Rule set a draft must satisfy. Every violated rule is reported, not just the first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QuestionContract {
    min_text_len: usize,
    required_option_count: Option<usize>,
}

impl QuestionContract {
    pub(crate) const fn authored() -> Self {
        Self { min_text_len: MIN_QUESTION_TEXT_LEN, required_option_count: None }
    }

    /// Generated questions must also match the option count the prompt demands.
    pub(crate) const fn generated() -> Self {
        Self {
            min_text_len: MIN_QUESTION_TEXT_LEN,
            required_option_count: Some(GENERATED_OPTION_COUNT),
        }
    }

    pub(crate) fn check(&self, draft: &QuestionDraft) -> Result<(), ContractError> {
        let mut violations = Vec::new();

        let text_len = draft.text.trim().chars().count();
        if text_len < self.min_text_len {
            violations.push(ContractViolation::TextTooShort { min: self.min_text_len, actual: text_len });
        }

        if draft.options.is_empty() {
            violations.push(ContractViolation::NoOptions);
        }

        let mut seen = HashSet::new();
        for (index, option) in draft.options.iter().enumerate() {
            let text = option.text.trim();
            if text.is_empty() {
                violations.push(ContractViolation::EmptyOptionText { index });
            } else if !seen.insert(text) {
                violations.push(ContractViolation::DuplicateOptionText { text: text.to_string() });
            }
        }

        let correct = draft.options.iter().filter(|option| option.is_correct).count();
        match correct {
            0 if !draft.options.is_empty() => violations.push(ContractViolation::NoCorrectOption),
            0 | 1 => {}
            count => violations.push(ContractViolation::MultipleCorrectOptions { count }),
        }

        let expected = match (self.required_option_count, draft.question_type) {
            (Some(required), _) => Some(required),
            (None, QuestionType::TrueFalse) => Some(TRUE_FALSE_OPTION_COUNT),
            (None, QuestionType::Mcq) => None,
        };
        if let Some(expected) = expected {
            if !draft.options.is_empty() && draft.options.len() != expected {
                violations.push(ContractViolation::WrongOptionCount {
                    expected,
                    actual: draft.options.len(),
                });
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ContractError { violations })
        }
    }

    /// Normalizes and checks in one step.
    pub(crate) fn admit(&self, draft: QuestionDraft) -> Result<QuestionDraft, ContractError> {
        let draft = draft.normalized();
        self.check(&draft)?;
        Ok(draft)
    }
}
