use super::error::FilterError;
use super::types::{PathSegment, SortDirection, SortField, SortKey, SqlParam};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse `"name asc, createdAt desc"` style sort strings
    pub fn parse(order: &str) -> Result<Vec<SortKey>, FilterError> {
        let mut out = Vec::new();
        for part in order.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(field) = it.next() {
                let direction = SortDirection::parse(it.next().unwrap_or("asc"));
                out.push(Self::key(field, direction)?);
            }
        }
        Ok(out)
    }

    /// Validated sort key for a single field
    pub fn key(field: &str, direction: SortDirection) -> Result<SortKey, FilterError> {
        let field = SortField::parse(field);
        if let SortField::Data(path) = &field {
            PathSegment::parse_path(path)?;
        }
        Ok(SortKey { field, direction })
    }

    /// `ORDER BY` clause; data paths are bound as `text[]` parameters
    pub fn generate(
        keys: &[SortKey],
        starting_param_index: usize,
    ) -> Result<(String, Vec<SqlParam>), FilterError> {
        if keys.is_empty() {
            return Ok((String::new(), vec![]));
        }

        let mut params = Vec::new();
        let mut index = starting_param_index;
        let mut parts = Vec::with_capacity(keys.len());

        for key in keys {
            let column = match &key.field {
                SortField::CreatedAt => "\"created_at\"".to_string(),
                SortField::UpdatedAt => "\"updated_at\"".to_string(),
                SortField::Data(path) => {
                    let segments = PathSegment::parse_path(path)?
                        .into_iter()
                        .map(|s| match s {
                            PathSegment::Key(k) => k,
                            PathSegment::Index(i) => i.to_string(),
                        })
                        .collect();
                    params.push(SqlParam::TextArray(segments));
                    index += 1;
                    format!("(\"data\" #> ${}::text[])", index)
                }
            };
            parts.push(format!("{} {}", column, key.direction.to_sql()));
        }

        Ok((format!("ORDER BY {}", parts.join(", ")), params))
    }
}
