use super::ident::sanitize_identifier;
use crate::error_handler::CustomError;
use crate::files::extract::Record;
use serde_json::Value;

/// Column types a dynamic table can carry. Anything that is not clearly
/// numeric falls back to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
}

impl ColumnType {
    pub fn from_value(value: &Value) -> ColumnType {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
            Value::Number(_) => ColumnType::Float,
            Value::String(_) => ColumnType::Text,
            _ => ColumnType::Text,
        }
    }

    /// Parses the `column_type` field of an add-column request.
    pub fn from_name(name: &str) -> Result<ColumnType, CustomError> {
        match name.trim().to_lowercase().as_str() {
            "string" | "text" | "varchar" => Ok(ColumnType::Text),
            "integer" | "int" => Ok(ColumnType::Integer),
            "float" | "double" => Ok(ColumnType::Float),
            other => Err(CustomError::validation(format!(
                "Unknown column type '{}'. Expected one of string, integer, float",
                other
            ))),
        }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "VARCHAR(255)",
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

/// Derives the column set from one representative record (the first record
/// of an upload). Field order is preserved and names are sanitized, so the
/// created table matches every later sanitized lookup.
pub fn infer_schema(sample: &Record) -> Vec<ColumnSpec> {
    sample
        .iter()
        .map(|(field, value)| ColumnSpec {
            name: sanitize_identifier(field),
            column_type: ColumnType::from_value(value),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn classifies_scalars() {
        assert_eq!(ColumnType::from_value(&json!("Alice")), ColumnType::Text);
        assert_eq!(ColumnType::from_value(&json!(30)), ColumnType::Integer);
        assert_eq!(ColumnType::from_value(&json!(1.5)), ColumnType::Float);
        assert_eq!(ColumnType::from_value(&json!(true)), ColumnType::Text);
        assert_eq!(ColumnType::from_value(&Value::Null), ColumnType::Text);
    }

    #[test]
    fn infers_sanitized_columns_in_field_order() {
        let sample = record(json!({"Name": "Alice", "Age": 30, "net worth": 1.5}));
        let schema = infer_schema(&sample);
        assert_eq!(
            schema,
            vec![
                ColumnSpec { name: "NAME".into(), column_type: ColumnType::Text },
                ColumnSpec { name: "AGE".into(), column_type: ColumnType::Integer },
                ColumnSpec { name: "NET_WORTH".into(), column_type: ColumnType::Float },
            ]
        );
    }

    #[test]
    fn column_type_names_parse() {
        assert_eq!(ColumnType::from_name("string").unwrap(), ColumnType::Text);
        assert_eq!(ColumnType::from_name("Integer").unwrap(), ColumnType::Integer);
        assert_eq!(ColumnType::from_name("FLOAT").unwrap(), ColumnType::Float);
        assert!(ColumnType::from_name("blob").is_err());
    }

    #[test]
    fn sql_types_match_the_created_ddl() {
        assert_eq!(ColumnType::Text.sql_type(), "VARCHAR(255)");
        assert_eq!(ColumnType::Integer.sql_type(), "INTEGER");
        assert_eq!(ColumnType::Float.sql_type(), "FLOAT");
    }
}
