use serde_json::Value;
use uuid::Uuid;

use super::error::FilterError;

/// Predicate over documents. Field names are dotted paths inside the
/// document's `data` object (`recipients.classCode`, `teachers.0.courseCode`).
///
/// Path traversal is lax: arrays met along the path are searched element by
/// element, and an array at the end of the path matches when any element does.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Id(Uuid),
    IdNot(Uuid),
    Eq { field: String, value: Value },
    Ne { field: String, value: Value },
    /// Case-insensitive substring match on string/number values
    Contains { field: String, needle: String },
    In { field: String, values: Vec<Value> },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq { field: field.into(), value: value.into() }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne { field: field.into(), value: value.into() }
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Filter::Contains { field: field.into(), needle: needle.into() }
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::In { field: field.into(), values }
    }

    /// Combine with another filter, flattening nested `And`s and dropping `All`
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), f) => {
                a.push(f);
                Filter::And(a)
            }
            (f, Filter::And(mut b)) => {
                b.insert(0, f);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Every field path referenced by this filter
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Filter::All | Filter::Id(_) | Filter::IdNot(_) => vec![],
            Filter::Eq { field, .. }
            | Filter::Ne { field, .. }
            | Filter::Contains { field, .. }
            | Filter::In { field, .. } => vec![field.as_str()],
            Filter::And(filters) | Filter::Or(filters) => {
                filters.iter().flat_map(|f| f.fields()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// `desc`/`-1` are descending, anything else ascending
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "desc" | "-1" | "descending" => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Data(String),
}

impl SortField {
    /// `createdAt`/`updatedAt` map to envelope timestamps, any other name to a data path
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "createdAt" | "created_at" => SortField::CreatedAt,
            "updatedAt" | "updated_at" => SortField::UpdatedAt,
            other => SortField::Data(other.trim_start_matches("data.").to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

/// One segment of a validated field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    /// Split a dotted field path. Keys may hold letters, digits, `_` and `-`;
    /// all-digit segments are array indexes.
    pub fn parse_path(field: &str) -> Result<Vec<PathSegment>, FilterError> {
        let field = field.strip_prefix("data.").unwrap_or(field);
        if field.is_empty() {
            return Err(FilterError::InvalidField(field.to_string()));
        }

        field
            .split('.')
            .map(|segment| {
                if segment.is_empty() {
                    return Err(FilterError::InvalidField(field.to_string()));
                }
                if segment.chars().all(|c| c.is_ascii_digit()) {
                    return segment
                        .parse()
                        .map(PathSegment::Index)
                        .map_err(|_| FilterError::InvalidField(field.to_string()));
                }
                if segment.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
                    Ok(PathSegment::Key(segment.to_string()))
                } else {
                    Err(FilterError::InvalidField(field.to_string()))
                }
            })
            .collect()
    }
}

/// Bind parameter produced by SQL generation
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Json(Value),
    Uuid(Uuid),
    TextArray(Vec<String>),
}
