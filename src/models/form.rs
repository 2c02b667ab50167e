use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::DataMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormMetadata {
    #[serde(default)]
    pub created_by: String,
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default)]
    pub status: FormStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(flatten)]
    pub extra: DataMap,
}

fn first_version() -> u32 {
    1
}

impl FormMetadata {
    pub fn new(created_by: impl Into<String>) -> Self {
        Self {
            created_by: created_by.into(),
            version: 1,
            status: FormStatus::Draft,
            last_modified_by: None,
            last_modified_at: None,
            deleted_at: None,
            deleted_by: None,
            extra: DataMap::new(),
        }
    }
}

/// Form definition built in the form builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub title: String,
    #[serde(default)]
    pub fields: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FormMetadata>,
    #[serde(flatten)]
    pub extra: DataMap,
}

impl Form {
    /// Validate an incoming payload: `title` non-empty, `fields` an array
    pub fn from_input(mut input: DataMap) -> Result<Self, String> {
        match input.get("title").and_then(Value::as_str) {
            Some(title) if !title.trim().is_empty() => {}
            _ => return Err("Form title is required".to_string()),
        }
        if !matches!(input.get("fields"), Some(Value::Array(_))) {
            return Err("Form fields must be an array".to_string());
        }
        // Identity and timestamps belong to the envelope
        for key in ["_id", "createdAt", "updatedAt"] {
            input.remove(key);
        }
        serde_json::from_value(Value::Object(input)).map_err(|e| e.to_string())
    }

    pub fn is_archived(&self) -> bool {
        self.metadata
            .as_ref()
            .map(|m| m.status == FormStatus::Archived)
            .unwrap_or(false)
    }
}

/// One filled-in form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub form_id: String,
    #[serde(default)]
    pub form_title: String,
    pub answers: Value,
    #[serde(default)]
    pub submitted_by: String,
    #[serde(default)]
    pub submission_source: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub ip_address: String,
}
