use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::types::{Filter, SortDirection, SortKey};

/// Filter + sort + window, the argument of every store read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sort(mut self, field: &str, direction: SortDirection) -> Result<Self, FilterError> {
        self.sort.push(FilterOrder::key(field, direction)?);
        Ok(self)
    }

    /// Append an already validated key
    pub fn sort_key(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Sort by `createdAt` descending
    pub fn newest_first(mut self) -> Self {
        self.sort.push(SortKey {
            field: super::types::SortField::CreatedAt,
            direction: SortDirection::Desc,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// 1-based page window. `skip` is capped to what Postgres accepts as an `OFFSET`.
    pub fn page(mut self, page: u64, page_size: u64) -> Self {
        self.skip = page
            .saturating_sub(1)
            .saturating_mul(page_size)
            .min(i64::MAX as u64);
        self.limit = Some(page_size);
        self
    }
}

impl Filter {
    /// Parse a query document such as
    /// `{"schoolCode": "2001", "status": {"$in": ["a", "b"]}, "$or": [...]}`
    ///
    /// Supported operators: `$eq`, `$ne`, `$in`, `$regex`/`$ilike` (substring),
    /// `$and`, `$or`. `$options` is accepted and ignored.
    pub fn from_json(where_data: &Value) -> Result<Filter, FilterError> {
        match where_data {
            Value::Null => Ok(Filter::All),
            Value::Object(obj) => Self::parse_object(obj),
            _ => Err(FilterError::InvalidWhereClause(
                "Filter must be a JSON object".to_string(),
            )),
        }
    }

    fn parse_object(obj: &Map<String, Value>) -> Result<Filter, FilterError> {
        let mut filter = Filter::All;
        for (key, value) in obj {
            let condition = if key.starts_with('$') {
                Self::parse_logical_operator(key, value)?
            } else {
                Self::parse_field_condition(key, value)?
            };
            filter = filter.and(condition);
        }
        Ok(filter)
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Filter, FilterError> {
        let arr = value
            .as_array()
            .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
        let parts = arr
            .iter()
            .map(Self::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        match op {
            "$and" => Ok(Filter::And(parts)),
            "$or" => Ok(Filter::Or(parts)),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Filter, FilterError> {
        let obj = match value {
            Value::Object(obj) if obj.keys().any(|k| k.starts_with('$')) => obj,
            // Implicit equality: { field: value }
            _ => return Ok(Filter::eq(field, value.clone())),
        };

        let mut filter = Filter::All;
        for (op_key, op_val) in obj {
            let condition = match op_key.as_str() {
                "$eq" => Filter::eq(field, op_val.clone()),
                "$ne" | "$neq" => Filter::ne(field, op_val.clone()),
                "$in" => match op_val {
                    Value::Array(values) => Filter::is_in(field, values.clone()),
                    _ => {
                        return Err(FilterError::InvalidOperatorData(
                            "$in requires array".to_string(),
                        ))
                    }
                },
                "$regex" | "$ilike" => match op_val {
                    Value::String(s) => Filter::contains(field, s.trim_matches('%')),
                    _ => {
                        return Err(FilterError::InvalidOperatorData(format!(
                            "{} requires string",
                            op_key
                        )))
                    }
                },
                "$options" => continue,
                other => return Err(FilterError::UnsupportedOperator(other.to_string())),
            };
            filter = filter.and(condition);
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_implicit_equality() {
        let f = Filter::from_json(&json!({"schoolCode": "2001"})).unwrap();
        assert_eq!(f, Filter::eq("schoolCode", "2001"));
    }

    #[test]
    fn parses_operators() {
        let f = Filter::from_json(&json!({
            "status": {"$in": ["draft", "published"]},
            "name": {"$regex": "ali", "$options": "i"}
        }))
        .unwrap();
        let Filter::And(parts) = f else {
            panic!("expected And, got {:?}", f);
        };
        assert_eq!(parts.len(), 2);
        assert!(parts.contains(&Filter::contains("name", "ali")));
        assert!(parts.contains(&Filter::is_in(
            "status",
            vec![json!("draft"), json!("published")]
        )));
    }

    #[test]
    fn parses_logical_operators() {
        let f = Filter::from_json(&json!({"$or": [{"a": 1}, {"b": 2}]})).unwrap();
        assert_eq!(f, Filter::Or(vec![Filter::eq("a", 1), Filter::eq("b", 2)]));
    }

    #[test]
    fn rejects_unknown_operators() {
        assert!(matches!(
            Filter::from_json(&json!({"a": {"$where": "1"}})),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(Filter::from_json(&json!([1, 2])).is_err());
        assert!(Filter::from_json(&json!({"$or": {}})).is_err());
    }

    #[test]
    fn page_window() {
        let q = FindQuery::new(Filter::All).page(3, 20);
        assert_eq!(q.skip, 40);
        assert_eq!(q.limit, Some(20));
        assert_eq!(FindQuery::default().page(0, 10).skip, 0);
        assert_eq!(FindQuery::default().page(u64::MAX, 100).skip, i64::MAX as u64);
    }
}
