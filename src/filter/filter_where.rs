use super::error::FilterError;
use super::types::{Filter, PathSegment, SqlParam};

/// Translates a `Filter` into a Postgres WHERE fragment over
/// `(id UUID, data JSONB, created_at, updated_at)` rows.
///
/// Field predicates run through `jsonb_path_query` in lax mode so arrays along
/// the path are unwrapped the same way the in-memory matcher walks them.
pub struct FilterWhere {
    param_values: Vec<SqlParam>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Returns the clause and its bind values; placeholders start after
    /// `starting_param_index`
    pub fn generate(
        filter: &Filter,
        starting_param_index: usize,
    ) -> Result<(String, Vec<SqlParam>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let clause = filter_where.build(filter)?;
        Ok((clause, filter_where.param_values))
    }

    fn build(&mut self, filter: &Filter) -> Result<String, FilterError> {
        match filter {
            Filter::All => Ok("TRUE".to_string()),
            Filter::Id(id) => Ok(format!("\"id\" = {}", self.param(SqlParam::Uuid(*id)))),
            Filter::IdNot(id) => Ok(format!("\"id\" <> {}", self.param(SqlParam::Uuid(*id)))),
            Filter::Eq { field, value } => {
                let path = self.path(field)?;
                let value = self.param(SqlParam::Json(value.clone()));
                Ok(format!("EXISTS ({} WHERE v.val = {}::jsonb)", path, value))
            }
            Filter::Ne { field, value } => {
                let path = self.path(field)?;
                let value = self.param(SqlParam::Json(value.clone()));
                Ok(format!("NOT EXISTS ({} WHERE v.val = {}::jsonb)", path, value))
            }
            Filter::In { field, values } => {
                if values.is_empty() {
                    // Validate the field anyway so bad input still surfaces
                    PathSegment::parse_path(field)?;
                    return Ok("FALSE".to_string());
                }
                let path = self.path(field)?;
                let values = self.param(SqlParam::Json(serde_json::Value::Array(values.clone())));
                Ok(format!(
                    "EXISTS ({} WHERE v.val IN (SELECT jsonb_array_elements({}::jsonb)))",
                    path, values
                ))
            }
            Filter::Contains { field, needle } => {
                let path = self.path(field)?;
                let pattern = self.param(SqlParam::Text(format!("%{}%", escape_like(needle))));
                Ok(format!(
                    "EXISTS ({} WHERE jsonb_typeof(v.val) IN ('string', 'number') AND (v.val #>> '{{}}') ILIKE {})",
                    path, pattern
                ))
            }
            Filter::And(filters) => self.join(filters, " AND ", "TRUE"),
            Filter::Or(filters) => self.join(filters, " OR ", "FALSE"),
        }
    }

    fn join(&mut self, filters: &[Filter], separator: &str, empty: &str) -> Result<String, FilterError> {
        if filters.is_empty() {
            return Ok(empty.to_string());
        }
        let parts = filters
            .iter()
            .map(|f| self.build(f).map(|sql| format!("({})", sql)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(separator))
    }

    /// `SELECT 1 FROM jsonb_path_query(...)` yielding every value at `field`
    fn path(&mut self, field: &str) -> Result<String, FilterError> {
        let json_path = Self::json_path(field)?;
        let placeholder = self.param(SqlParam::Text(json_path));
        Ok(format!(
            "SELECT 1 FROM jsonb_path_query(\"data\", {}::jsonpath) AS v(val)",
            placeholder
        ))
    }

    /// Build a lax SQL/JSON path such as `$."recipients"."classCode"[*]`
    pub fn json_path(field: &str) -> Result<String, FilterError> {
        let segments = PathSegment::parse_path(field)?;
        let mut path = String::from("$");
        for segment in &segments {
            match segment {
                PathSegment::Key(key) => {
                    path.push_str(".\"");
                    path.push_str(key);
                    path.push('"');
                }
                PathSegment::Index(index) => path.push_str(&format!("[{}]", index)),
            }
        }
        // Unwrap a trailing array so elements match individually
        path.push_str("[*]");
        Ok(path)
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
