use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{lookup, parse_id, validate_collection, DataMap, Document, DocumentStore};
use crate::filter::{Filter, FindQuery};
use crate::models::FormField;

use super::{ServiceError, ServiceResult};

/// Fields the free-text `query` parameter searches
const SEARCH_FIELDS: [&str; 4] = ["name", "schoolCode", "username", "domain"];

/// Envelope keys clients may echo back inside `data`
const ENVELOPE_KEYS: [&str; 3] = ["_id", "createdAt", "updatedAt"];

/// Build the list filter from `?query=` and the `filters` object.
///
/// Strings become case-insensitive substring matches, numbers and booleans
/// exact matches, arrays membership tests. Empty values are ignored.
pub fn search_filter(query: Option<&str>, filters: Option<&DataMap>) -> Filter {
    let mut filter = Filter::All;

    if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
        filter = filter.and(Filter::Or(
            SEARCH_FIELDS
                .iter()
                .map(|field| Filter::contains(*field, query))
                .collect(),
        ));
    }

    for (field, value) in filters.into_iter().flatten() {
        let condition = match value {
            Value::String(s) if s.trim().is_empty() => continue,
            Value::String(s) => Filter::contains(field.as_str(), s.trim()),
            Value::Bool(_) | Value::Number(_) => Filter::eq(field.as_str(), value.clone()),
            Value::Array(values) if values.is_empty() => continue,
            Value::Array(values) => Filter::is_in(field.as_str(), values.clone()),
            Value::Null | Value::Object(_) => continue,
        };
        filter = filter.and(condition);
    }

    filter
}

pub async fn list(
    store: &dyn DocumentStore,
    collection: &str,
    filter: Filter,
    limit: u64,
) -> ServiceResult<Vec<Document>> {
    validate_collection(collection)?;
    let query = FindQuery::new(filter).newest_first().limit(limit);
    Ok(store.find(collection, &query).await?)
}

/// Enforce `isUnique` and `groupUniqueness` declarations against stored data.
///
/// `exclude` skips the document being updated.
pub async fn check_uniqueness(
    store: &dyn DocumentStore,
    collection: &str,
    data: &DataMap,
    form_structure: &[FormField],
    exclude: Option<Uuid>,
) -> ServiceResult<()> {
    let fields = FormField::walk(form_structure);
    let scoped = |filter: Filter| match exclude {
        Some(id) => filter.and(Filter::IdNot(id)),
        None => filter,
    };
    let mut errors = HashMap::new();

    for field in fields.iter().filter(|f| f.is_unique) {
        let Some(value) = present(data, field.data_path()) else {
            continue;
        };
        let filter = scoped(Filter::eq(field.data_path(), value.clone()));
        if store.exists(collection, &filter).await? {
            errors.insert(field.name.clone(), field.unique_message());
        }
    }

    let group: Vec<&FormField> = fields.iter().copied().filter(|f| f.group_uniqueness).collect();
    if !group.is_empty() {
        let values: Option<Vec<Filter>> = group
            .iter()
            .map(|f| present(data, f.data_path()).map(|v| Filter::eq(f.data_path(), v.clone())))
            .collect();
        // Incomplete combinations cannot collide
        if let Some(conditions) = values {
            let filter = scoped(Filter::And(conditions));
            if store.exists(collection, &filter).await? {
                for field in group {
                    errors
                        .entry(field.name.clone())
                        .or_insert_with(|| field.group_unique_message());
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        warn!("Uniqueness check failed in {}: {:?}", collection, errors.keys());
        Err(ServiceError::validation("Validation failed", errors))
    }
}

fn present<'a>(data: &'a DataMap, path: &str) -> Option<&'a Value> {
    lookup(data, path).filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

fn strip_envelope(mut data: DataMap) -> DataMap {
    for key in ENVELOPE_KEYS {
        data.remove(key);
    }
    data
}

pub async fn create(
    store: &dyn DocumentStore,
    collection: &str,
    data: DataMap,
    form_structure: &[FormField],
) -> ServiceResult<Document> {
    validate_collection(collection)?;
    let data = strip_envelope(data);
    check_uniqueness(store, collection, &data, form_structure, None).await?;

    let doc = store.insert(collection, data).await?;
    info!("Created {} document {}", collection, doc.id);
    Ok(doc)
}

pub async fn update(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    data: DataMap,
    form_structure: &[FormField],
) -> ServiceResult<Document> {
    validate_collection(collection)?;
    let id = parse_id(id)?;
    let data = strip_envelope(data);

    if store.find_by_id(collection, id).await?.is_none() {
        return Err(ServiceError::not_found("Document not found"));
    }
    check_uniqueness(store, collection, &data, form_structure, Some(id)).await?;

    let doc = store
        .replace(collection, id, data)
        .await?
        .ok_or_else(|| ServiceError::not_found("Document not found"))?;
    info!("Updated {} document {}", collection, doc.id);
    Ok(doc)
}

/// Returns the deleted count, always 1
pub async fn delete(store: &dyn DocumentStore, collection: &str, id: &str) -> ServiceResult<u64> {
    validate_collection(collection)?;
    let id = parse_id(id)?;

    match store.delete_one(collection, &Filter::Id(id)).await? {
        0 => {
            warn!("Delete of missing {} document {}", collection, id);
            Err(ServiceError::not_found("Document not found"))
        }
        deleted => {
            info!("Deleted {} document {}", collection, id);
            Ok(deleted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDocumentStore;
    use serde_json::json;

    fn data(value: Value) -> DataMap {
        value.as_object().cloned().unwrap()
    }

    fn structure(value: Value) -> Vec<FormField> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn builds_search_filter() {
        assert_eq!(search_filter(Some("  "), None), Filter::All);

        let filters = data(json!({"grade": 7, "isActive": true, "city": "", "tags": ["a"]}));
        let filter = search_filter(Some("ali"), Some(&filters));
        let Filter::And(parts) = filter else {
            panic!("expected And");
        };
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[0], Filter::Or(or) if or.len() == 4));
        assert!(parts.contains(&Filter::eq("grade", 7)));
        assert!(parts.contains(&Filter::eq("isActive", true)));
        assert!(parts.contains(&Filter::is_in("tags", vec![json!("a")])));
    }

    #[tokio::test]
    async fn unique_fields_are_enforced() {
        let store = MemoryDocumentStore::new("t");
        let fields = structure(json!([
            {"name": "username", "isUnique": true, "validation": {"uniqueMessage": "Username taken"}}
        ]));
        let first = create(&store, "users", data(json!({"username": "ali"})), &fields)
            .await
            .unwrap();

        let err = create(&store, "users", data(json!({"username": "ali"})), &fields)
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation { message, fields } => {
                assert_eq!(message, "Validation failed");
                assert_eq!(fields["username"], "Username taken");
            }
            other => panic!("unexpected {:?}", other),
        }

        // Updating the same document keeps its own value
        let id = first.id.to_string();
        update(&store, "users", &id, data(json!({"username": "ali", "x": 1})), &fields)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn group_uniqueness_needs_full_combination() {
        let store = MemoryDocumentStore::new("t");
        let fields = structure(json!([
            {"name": "classCode", "groupUniqueness": true},
            {"name": "schoolCode", "groupUniqueness": true}
        ]));
        create(&store, "classes", data(json!({"classCode": "7A", "schoolCode": "1"})), &fields)
            .await
            .unwrap();
        create(&store, "classes", data(json!({"classCode": "7A", "schoolCode": "2"})), &fields)
            .await
            .unwrap();
        create(&store, "classes", data(json!({"classCode": "7A"})), &fields)
            .await
            .unwrap();
        let err = create(&store, "classes", data(json!({"classCode": "7A", "schoolCode": "1"})), &fields)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { ref fields, .. } if fields.len() == 2));
    }

    #[tokio::test]
    async fn delete_reports_missing_documents() {
        let store = MemoryDocumentStore::new("t");
        let doc = store.insert("notes", data(json!({"a": 1}))).await.unwrap();

        assert_eq!(delete(&store, "notes", &doc.id.to_string()).await.unwrap(), 1);
        let err = delete(&store, "notes", &doc.id.to_string()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "Document not found"));

        let err = delete(&store, "notes", "not-a-uuid").await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(_)));
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let store = MemoryDocumentStore::new("t");
        let err = update(&store, "notes", &Uuid::new_v4().to_string(), DataMap::new(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
