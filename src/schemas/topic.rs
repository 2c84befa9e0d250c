use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Topic;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TopicCreate {
    #[validate(length(min = 1, max = 200, message = "name must be 1-200 characters"))]
    pub(crate) name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TopicResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) created_at: String,
}

impl From<Topic> for TopicResponse {
    fn from(topic: Topic) -> Self {
        Self { id: topic.id, name: topic.name, created_at: format_primitive(topic.created_at) }
    }
}
