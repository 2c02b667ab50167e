use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::middleware::SessionUser;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSubmitter {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    pub user_type: String,
    pub school_code: String,
    pub domain: String,
}

/// Bug report or suggestion, kept in the master database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub submitted_by: FeedbackSubmitter,
    /// Already-stored image references; uploads are handled elsewhere
    #[serde(default)]
    pub images: Vec<Value>,
}

fn default_priority() -> String {
    "medium".to_string()
}

fn default_status() -> String {
    "open".to_string()
}

impl FeedbackSubmitter {
    pub fn from_session(user: &SessionUser, domain: &str) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            user_type: user.user_type.clone(),
            school_code: user.school_code.clone(),
            domain: domain.to_string(),
        }
    }
}
