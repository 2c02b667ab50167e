use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::DataMap;

/// Public website page (`website_pages`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default = "published_by_default")]
    pub is_published: bool,
    #[serde(default = "published_by_default")]
    pub is_active: bool,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub meta_keywords: String,
    #[serde(default)]
    pub modules: Vec<Value>,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: DataMap,
}

fn published_by_default() -> bool {
    true
}

impl Page {
    /// Fill in the slug from the title when absent and keep `isActive` in
    /// step with `isPublished`
    pub fn normalize(&mut self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        let source = if self.slug.trim().is_empty() {
            &self.title
        } else {
            &self.slug
        };
        let slug = slugify(source);
        if slug.is_empty() {
            return Err("slug must contain letters or digits".to_string());
        }
        self.slug = slug;
        self.is_active = self.is_published;
        Ok(())
    }
}

/// Lowercase, drop punctuation, collapse whitespace into `-`
pub fn slugify(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .trim_matches('-')
        .to_string()
}
