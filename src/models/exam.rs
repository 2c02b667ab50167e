use serde::{Deserialize, Serialize};

use crate::database::DataMap;
use crate::middleware::SessionUser;

/// A recipient entry: either a bare code or `{label, value}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    Code(String),
    Labeled(LabeledRecipient),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub value: String,
    #[serde(flatten)]
    pub extra: DataMap,
}

impl Recipient {
    pub fn value(&self) -> &str {
        match self {
            Recipient::Code(code) => code,
            Recipient::Labeled(labeled) => &labeled.value,
        }
    }
}

fn any_matches(list: &[Recipient], candidates: &[String]) -> bool {
    list.iter()
        .any(|r| candidates.iter().any(|c| c == r.value()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipients {
    #[serde(default)]
    pub students: Vec<Recipient>,
    #[serde(default)]
    pub groups: Vec<Recipient>,
    #[serde(default)]
    pub class_code: Vec<Recipient>,
    #[serde(default)]
    pub teachers: Vec<Recipient>,
    #[serde(flatten)]
    pub extra: DataMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    #[serde(default)]
    pub exam_code: String,
    #[serde(default)]
    pub exam_name: String,
    #[serde(default)]
    pub school_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Recipients>,
    #[serde(flatten)]
    pub extra: DataMap,
}

impl Exam {
    pub fn validate(&self) -> Result<(), String> {
        if self.exam_code.trim().is_empty() {
            return Err("examCode is required".to_string());
        }
        if self.exam_name.trim().is_empty() {
            return Err("examName is required".to_string());
        }
        Ok(())
    }

    /// School users see everything; teachers need a direct entry; students
    /// match by code, class or group
    pub fn is_visible_to(&self, user: &SessionUser) -> bool {
        if user.user_type == "school" {
            return true;
        }
        let Some(recipients) = &self.recipients else {
            return false;
        };

        let me = std::slice::from_ref(&user.username);

        match user.user_type.as_str() {
            "teacher" => any_matches(&recipients.teachers, me),
            "student" => {
                any_matches(&recipients.students, me)
                    || any_matches(&recipients.class_code, &user.class_codes)
                    || any_matches(&recipients.groups, &user.groups)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(user_type: &str, username: &str) -> SessionUser {
        SessionUser {
            id: "1".into(),
            username: username.into(),
            role: user_type.into(),
            user_type: user_type.into(),
            school_code: "2001".into(),
            domain: "d".into(),
            name: None,
            class_codes: vec!["7A".into()],
            groups: vec!["1".into()],
        }
    }

    fn exam(recipients: serde_json::Value) -> Exam {
        serde_json::from_value(json!({
            "examCode": "E1",
            "examName": "Midterm",
            "schoolCode": "2001",
            "recipients": recipients,
        }))
        .unwrap()
    }

    #[test]
    fn recipients_accept_strings_and_objects() {
        let e = exam(json!({"students": ["s1", {"label": "Ali", "value": "s2"}]}));
        let values: Vec<_> = e.recipients.unwrap().students.iter().map(|r| r.value().to_string()).collect();
        assert_eq!(values, vec!["s1", "s2"]);
    }

    #[test]
    fn school_sees_everything() {
        let e: Exam = serde_json::from_value(json!({"examCode": "E1"})).unwrap();
        assert!(e.is_visible_to(&user("school", "admin")));
        assert!(!e.is_visible_to(&user("student", "s1")));
    }

    #[test]
    fn teacher_needs_direct_entry() {
        let e = exam(json!({"teachers": [{"value": "t1"}], "classCode": ["7A"]}));
        assert!(e.is_visible_to(&user("teacher", "t1")));
        assert!(!e.is_visible_to(&user("teacher", "t2")));
    }

    #[test]
    fn student_matches_by_code_class_or_group() {
        assert!(exam(json!({"students": ["s1"]})).is_visible_to(&user("student", "s1")));
        assert!(exam(json!({"classCode": [{"value": "7A"}]})).is_visible_to(&user("student", "s9")));
        assert!(exam(json!({"groups": ["1"]})).is_visible_to(&user("student", "s9")));
        assert!(!exam(json!({"classCode": ["8B"]})).is_visible_to(&user("student", "s9")));
    }
}
