use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::DataMap;

/// Inbox entry (`messagelist`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_id: Option<String>,
    #[serde(default)]
    pub sendername: String,
    #[serde(default)]
    pub sendercode: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub receivercode: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_message_id: Option<String>,
    #[serde(flatten)]
    pub extra: DataMap,
}

impl Message {
    pub fn validate(&self) -> Result<(), String> {
        if self.receivercode.trim().is_empty() {
            return Err("Receiver code is required".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.message.trim().is_empty() {
            return Err("message is required".to_string());
        }
        Ok(())
    }
}
