use serde::Deserialize;

/// Field definition sent along with generic CRUD writes. Only the parts used
/// for server-side uniqueness checks are modeled.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub group_uniqueness: bool,
    #[serde(default)]
    pub validation: Option<FieldValidation>,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    #[serde(default)]
    pub unique_message: Option<String>,
    #[serde(default)]
    pub group_unique_message: Option<String>,
}

impl FormField {
    /// Dotted path of the value inside `data`
    pub fn data_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }

    pub fn unique_message(&self) -> String {
        self.validation
            .as_ref()
            .and_then(|v| v.unique_message.clone())
            .unwrap_or_else(|| format!("{} must be unique", self.name))
    }

    pub fn group_unique_message(&self) -> String {
        self.validation
            .as_ref()
            .and_then(|v| v.group_unique_message.clone())
            .unwrap_or_else(|| "This combination of values already exists".to_string())
    }

    /// This field and all nested fields, depth first
    pub fn walk(fields: &[FormField]) -> Vec<&FormField> {
        let mut out = Vec::new();
        for field in fields {
            out.push(field);
            out.extend(Self::walk(&field.fields));
        }
        out
    }
}
