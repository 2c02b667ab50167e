//! In-memory evaluation of `Filter` and `SortKey`, mirroring the JSONB SQL
//! rendering so both stores return the same documents in the same order.

use serde_json::Value;
use std::cmp::Ordering;

use super::types::{Filter, PathSegment, SortDirection, SortField, SortKey};
use crate::database::Document;

pub fn matches(filter: &Filter, doc: &Document) -> bool {
    match filter {
        Filter::All => true,
        Filter::Id(id) => doc.id == *id,
        Filter::IdNot(id) => doc.id != *id,
        Filter::Eq { field, value } => values_at(doc, field).iter().any(|v| json_eq(v, value)),
        Filter::Ne { field, value } => !values_at(doc, field).iter().any(|v| json_eq(v, value)),
        Filter::In { field, values } => values_at(doc, field)
            .iter()
            .any(|v| values.iter().any(|candidate| json_eq(v, candidate))),
        Filter::Contains { field, needle } => {
            let needle = needle.to_lowercase();
            values_at(doc, field).iter().any(|v| match v {
                Value::String(s) => s.to_lowercase().contains(&needle),
                Value::Number(n) => n.to_string().contains(&needle),
                _ => false,
            })
        }
        Filter::And(filters) => filters.iter().all(|f| matches(f, doc)),
        Filter::Or(filters) => filters.iter().any(|f| matches(f, doc)),
    }
}

/// Every value reachable at `field`: arrays met on the way are searched
/// element-wise and a final array yields its elements
pub fn values_at<'a>(doc: &'a Document, field: &str) -> Vec<&'a Value> {
    let segments = match PathSegment::parse_path(field) {
        Ok(segments) => segments,
        Err(_) => return vec![],
    };

    let mut current: Vec<&Value> = Vec::new();
    let mut segments_iter = segments.iter();
    match segments_iter.next() {
        Some(PathSegment::Key(key)) => current.extend(doc.data.get(key.as_str())),
        Some(PathSegment::Index(index)) => current.extend(doc.data.get(&index.to_string())),
        None => return vec![],
    }

    for segment in segments_iter {
        let mut next = Vec::new();
        for value in current {
            match (segment, value) {
                (PathSegment::Key(key), Value::Object(obj)) => next.extend(obj.get(key.as_str())),
                (PathSegment::Key(key), Value::Array(arr)) => {
                    for item in arr {
                        if let Value::Object(obj) = item {
                            next.extend(obj.get(key.as_str()));
                        }
                    }
                }
                (PathSegment::Index(index), Value::Array(arr)) => next.extend(arr.get(*index)),
                (PathSegment::Index(index), Value::Object(obj)) => {
                    next.extend(obj.get(&index.to_string()))
                }
                _ => {}
            }
        }
        current = next;
    }

    current
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(arr) => arr.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Compare two documents under a list of sort keys.
///
/// Missing values sort last ascending and first descending, matching
/// Postgres' default NULL placement.
pub fn compare(keys: &[SortKey], a: &Document, b: &Document) -> Ordering {
    for key in keys {
        let ordering = match &key.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Data(path) => {
                match (a.get(path), b.get(path)) {
                    (Some(x), Some(y)) => json_cmp(x, y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            }
        };
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// JSONB ordering: Object > Array > Boolean > Number > String > Null
fn json_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::String(_) => 1,
            Value::Number(_) => 2,
            Value::Bool(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
