use serde_json::Value;

use crate::auth::LabelValue;
use crate::database::{validate_collection, value_text, Document, DocumentStore, StoreError};
use crate::filter::{Filter, FindQuery, SortDirection};

use super::{ServiceError, ServiceResult};

/// Parsed `/api/dropdown-options/:collection` parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DropdownQuery {
    pub label_field: String,
    pub value_field: String,
    pub filter: Filter,
    pub sort: Option<(String, SortDirection)>,
    pub limit: Option<u64>,
    pub custom_label: Option<String>,
}

impl Default for DropdownQuery {
    fn default() -> Self {
        Self {
            label_field: "_id".to_string(),
            value_field: "_id".to_string(),
            filter: Filter::All,
            sort: None,
            limit: None,
            custom_label: None,
        }
    }
}

/// `filterQuery` is a JSON query document over `data` fields
pub fn parse_filter_query(raw: &str) -> ServiceResult<Filter> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|_| ServiceError::invalid("Invalid filterQuery JSON"))?;
    Filter::from_json(&value).map_err(|e| ServiceError::Store(StoreError::Filter(e)))
}

pub async fn options(
    store: &dyn DocumentStore,
    collection: &str,
    params: &DropdownQuery,
) -> ServiceResult<Vec<LabelValue>> {
    validate_collection(collection)?;
    let mut query = FindQuery::new(params.filter.clone());
    if let Some((field, direction)) = &params.sort {
        query = query.sort(field, *direction)?;
    }
    if let Some(limit) = params.limit {
        query = query.limit(limit);
    }

    let docs = store.find(collection, &query).await?;
    Ok(docs
        .iter()
        .map(|doc| {
            let label = match &params.custom_label {
                Some(template) => render_label(template, doc),
                None => field_text(doc, &params.label_field),
            };
            LabelValue::new(label, field_text(doc, &params.value_field))
        })
        .collect())
}

/// Envelope keys resolve to the envelope, anything else to a `data` path
fn field_text(doc: &Document, field: &str) -> String {
    match field {
        "_id" | "id" => doc.id.to_string(),
        "createdAt" => doc.created_at.to_rfc3339(),
        "updatedAt" => doc.updated_at.to_rfc3339(),
        path => doc
            .get(path.trim_start_matches("data."))
            .map(value_text)
            .unwrap_or_default(),
    }
}

/// Replace `{field}` placeholders; unknown fields render empty
pub fn render_label(template: &str, doc: &Document) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        match rest[start + 1..].find('}') {
            Some(len) => {
                let field = rest[start + 1..start + 1 + len].trim();
                out.push_str(&field_text(doc, field));
                rest = &rest[start + len + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDocumentStore;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::new(value.as_object().cloned().unwrap())
    }

    #[test]
    fn renders_templates() {
        let d = doc(json!({"studentName": "Sara", "studentFamily": "Ahmadi", "grade": 7}));
        assert_eq!(render_label("{studentName} {studentFamily}", &d), "Sara Ahmadi");
        assert_eq!(render_label("{grade} - {missing}", &d), "7 - ");
        assert_eq!(render_label("plain", &d), "plain");
        assert_eq!(render_label("open {brace", &d), "open {brace");
        assert_eq!(render_label("{_id}", &d), d.id.to_string());
    }

    #[test]
    fn rejects_malformed_filter_query() {
        assert!(matches!(parse_filter_query("{oops"), Err(ServiceError::Invalid(_))));
        assert!(matches!(parse_filter_query("[1]"), Err(ServiceError::Store(_))));
        assert_eq!(
            parse_filter_query(r#"{"schoolCode": "2001"}"#).unwrap(),
            Filter::eq("schoolCode", "2001")
        );
    }

    #[tokio::test]
    async fn builds_sorted_options() {
        let store = MemoryDocumentStore::new("t");
        for (code, name) in [("c2", "Physics"), ("c1", "Algebra"), ("c3", "Chemistry")] {
            store
                .insert(
                    "courses",
                    json!({"courseCode": code, "courseName": name, "schoolCode": "2001"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                )
                .await
                .unwrap();
        }

        let params = DropdownQuery {
            label_field: "courseName".into(),
            value_field: "courseCode".into(),
            sort: Some(("courseName".into(), SortDirection::Asc)),
            limit: Some(2),
            ..Default::default()
        };
        let opts = options(&store, "courses", &params).await.unwrap();
        assert_eq!(
            opts,
            vec![LabelValue::new("Algebra", "c1"), LabelValue::new("Chemistry", "c3")]
        );

        let err = options(&store, "bad-name", &DropdownQuery::default()).await;
        assert!(matches!(err, Err(ServiceError::Store(StoreError::InvalidCollection(_)))));
    }
}
