use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Student,
    Instructor,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub(crate) enum QuestionType {
    #[default]
    Mcq,
    TrueFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "difficultylevel", rename_all = "lowercase")]
pub(crate) enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl QuestionType {
    /// Lenient parse used for model output: case and separators are ignored.
    pub(crate) fn parse_loose(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "MCQ" | "MULTIPLECHOICE" | "MULTIPLE_CHOICE" => Some(Self::Mcq),
            "TRUE_FALSE" | "TRUEFALSE" | "BOOLEAN" => Some(Self::TrueFalse),
            _ => None,
        }
    }
}

impl DifficultyLevel {
    pub(crate) fn parse_loose(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "EASY" => Some(Self::Easy),
            "MEDIUM" => Some(Self::Medium),
            "HARD" => Some(Self::Hard),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "EASY",
            Self::Medium => "MEDIUM",
            Self::Hard => "HARD",
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_ascii_uppercase().replace(['-', ' '], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_parsing_accepts_model_spellings() {
        assert_eq!(QuestionType::parse_loose("mcq"), Some(QuestionType::Mcq));
        assert_eq!(QuestionType::parse_loose("multiple-choice"), Some(QuestionType::Mcq));
        assert_eq!(QuestionType::parse_loose("True False"), Some(QuestionType::TrueFalse));
        assert_eq!(QuestionType::parse_loose("essay"), None);

        assert_eq!(DifficultyLevel::parse_loose(" hard "), Some(DifficultyLevel::Hard));
        assert_eq!(DifficultyLevel::parse_loose("Medium"), Some(DifficultyLevel::Medium));
        assert_eq!(DifficultyLevel::parse_loose("extreme"), None);
    }

    #[test]
    fn serde_uses_uppercase_wire_names() {
        assert_eq!(serde_json::to_value(QuestionType::TrueFalse).unwrap(), "TRUE_FALSE");
        assert_eq!(serde_json::to_value(DifficultyLevel::Easy).unwrap(), "EASY");
        assert_eq!(serde_json::to_value(UserRole::Instructor).unwrap(), "INSTRUCTOR");
        let parsed: DifficultyLevel = serde_json::from_str("\"HARD\"").unwrap();
        assert_eq!(parsed, DifficultyLevel::Hard);
    }
}
