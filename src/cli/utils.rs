use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Print a JSON value pretty, or each top-level field as `key: value`
pub fn output_record(output_format: &OutputFormat, record: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        OutputFormat::Text => match record.as_object() {
            Some(map) => {
                for (key, value) in map {
                    println!("{:<14} {}", format!("{}:", key), text_of(value));
                }
            }
            None => println!("{}", text_of(record)),
        },
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(
    output_format: &OutputFormat,
    collection_name: &str,
    message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: [] }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Scalars print bare, `null` as `-`, containers as compact JSON
pub fn text_of(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
