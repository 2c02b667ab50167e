use serde::{Deserialize, Serialize};

use crate::database::DataMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub course_name: String,
    #[serde(default)]
    pub school_code: String,
    #[serde(flatten)]
    pub extra: DataMap,
}

impl Course {
    pub fn validate(&self) -> Result<(), String> {
        if self.course_code.trim().is_empty() {
            return Err("courseCode is required".to_string());
        }
        if self.course_name.trim().is_empty() {
            return Err("courseName is required".to_string());
        }
        Ok(())
    }
}
