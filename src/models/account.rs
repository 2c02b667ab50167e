use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::LabelValue;
use crate::database::{value_text, Document};
use crate::filter::Filter;

use super::collections;

/// Who is logging in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Student,
    Teacher,
    School,
}

impl AccountRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "student" => Some(AccountRole::Student),
            "teacher" => Some(AccountRole::Teacher),
            "school" => Some(AccountRole::School),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Student => "student",
            AccountRole::Teacher => "teacher",
            AccountRole::School => "school",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            AccountRole::Student => collections::STUDENTS,
            AccountRole::Teacher => collections::TEACHERS,
            AccountRole::School => collections::SCHOOLS,
        }
    }

    /// Active account with this code in the school; the password is checked separately
    pub fn lookup_filter(&self, user_code: &str, school_code: &str, domain: &str) -> Filter {
        let base = Filter::And(vec![
            Filter::eq("schoolCode", school_code),
            Filter::eq("isActive", true),
        ]);
        match self {
            AccountRole::Student => base.and(Filter::eq("studentCode", user_code)),
            AccountRole::Teacher => base.and(Filter::eq("teacherCode", user_code)),
            AccountRole::School => base
                .and(Filter::Or(vec![
                    Filter::eq("username", user_code),
                    Filter::eq("schoolCode", user_code),
                ]))
                .and(Filter::eq("domain", domain)),
        }
    }
}

/// Profile returned by a successful login
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub id: String,
    pub domain: String,
    pub user_type: String,
    pub role: String,
    pub school_code: String,
    pub username: String,
    pub name: String,
    pub permissions: Vec<Value>,
    pub class_code: Vec<LabelValue>,
    pub groups: Vec<LabelValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maghta: Option<String>,
}

impl LoginUser {
    pub fn from_account(role: AccountRole, doc: &Document, domain: &str) -> Self {
        let text = |field: &str| doc.get(field).map(value_text).unwrap_or_default();
        let permissions = doc
            .get("premisions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let maghta = doc.get("maghta").map(value_text);

        match role {
            AccountRole::Student => {
                let class_code = text("classCode");
                LoginUser {
                    id: doc.id.to_string(),
                    domain: domain.to_string(),
                    user_type: role.as_str().to_string(),
                    role: role.as_str().to_string(),
                    school_code: text("schoolCode"),
                    username: text("studentCode"),
                    name: format!("{} {}", text("studentName"), text("studentFamily"))
                        .trim()
                        .to_string(),
                    permissions,
                    class_code: if class_code.is_empty() {
                        vec![]
                    } else {
                        vec![LabelValue::new(class_code.clone(), class_code)]
                    },
                    groups: vec![LabelValue::new("Students", "1")],
                    maghta: maghta.or_else(|| Some("3".to_string())),
                }
            }
            AccountRole::Teacher => LoginUser {
                id: doc.id.to_string(),
                domain: domain.to_string(),
                user_type: role.as_str().to_string(),
                role: role.as_str().to_string(),
                school_code: text("schoolCode"),
                username: text("teacherCode"),
                name: text("teacherName"),
                permissions,
                class_code: vec![],
                groups: vec![LabelValue::new("Teachers", "2")],
                maghta: None,
            },
            AccountRole::School => LoginUser {
                id: doc.id.to_string(),
                domain: doc
                    .get_str("domain")
                    .map(str::to_string)
                    .unwrap_or_else(|| domain.to_string()),
                user_type: role.as_str().to_string(),
                role: role.as_str().to_string(),
                school_code: text("schoolCode"),
                username: text("username"),
                name: text("schoolName"),
                permissions,
                class_code: vec![],
                groups: vec![],
                maghta,
            },
        }
    }
}
