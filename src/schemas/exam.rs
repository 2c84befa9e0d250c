use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Exam;
use crate::repositories::exams::ExamListRow;
use crate::schemas::topic::TopicResponse;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 4, message = "title must be at least 4 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 5, message = "duration_minutes must be at least 5"))]
    pub(crate) duration_minutes: i32,
    #[serde(alias = "passingScore")]
    #[validate(range(min = 1, max = 100, message = "passing_score must be between 1 and 100"))]
    pub(crate) passing_score: i32,
    #[serde(default, alias = "isPublished")]
    pub(crate) is_published: bool,
    #[serde(alias = "topicIds")]
    #[validate(length(min = 1, message = "select at least one topic"))]
    pub(crate) topic_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_score: i32,
    pub(crate) is_published: bool,
    pub(crate) instructor_id: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) topics: Vec<TopicResponse>,
}

impl ExamResponse {
    pub(crate) fn new(exam: Exam, topics: Vec<TopicResponse>) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            duration_minutes: exam.duration_minutes,
            passing_score: exam.passing_score,
            is_published: exam.is_published,
            instructor_id: exam.instructor_id,
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
            topics,
        }
    }
}

/// Listing entry; topics are names only.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamSummaryResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_score: i32,
    pub(crate) is_published: bool,
    pub(crate) instructor_id: String,
    pub(crate) created_at: String,
    pub(crate) topics: Vec<String>,
    pub(crate) question_count: i64,
}

impl From<ExamListRow> for ExamSummaryResponse {
    fn from(row: ExamListRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            duration_minutes: row.duration_minutes,
            passing_score: row.passing_score,
            is_published: row.is_published,
            instructor_id: row.instructor_id,
            created_at: format_primitive(row.created_at),
            topics: row.topics,
            question_count: row.question_count,
        }
    }
}
