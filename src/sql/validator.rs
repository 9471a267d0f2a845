use crate::errors;
use crate::storage::{ColumnType, ColumnValue, Offset};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NAME_REGEX: Regex = Regex::new(r#"^[A-Za-z_][A-Za-z0-9_]*$"#).unwrap();
    static ref TYPE_REGEX: Regex = Regex::new(r#"^(?i)(INT|INTEGER|FLOAT|CHAR|VARCHAR)$"#).unwrap();
    static ref INT_REGEX: Regex = Regex::new(r#"^[-+]?\d+$"#).unwrap();
    static ref FLOAT_REGEX: Regex =
        Regex::new(r#"^[-+]?(\d+\.\d*|\.\d+|\d+)([eE][-+]?\d+)?$"#).unwrap();
}

/// Validates an index name against the regex.
///
/// # Arguments
/// * `name` - The index name to validate.
///
/// # Returns
/// A `Result` containing the validated name or an `errors::Error`.
pub fn validate_index_name(name: &str) -> Result<String, errors::Error> {
    if name.is_empty() {
        return Err(errors::Error::Syntax(
            "Index name cannot be empty.".to_owned(),
        ));
    }
    if NAME_REGEX.is_match(name) {
        Ok(name.to_string())
    } else {
        Err(errors::Error::Syntax(format!(
            "Index name ({}) must match regex {}.",
            name,
            NAME_REGEX.as_str()
        )))
    }
}

/// Validates a key type and converts it.
///
/// # Arguments
/// * `type_str` - The key type to validate.
///
/// # Returns
/// The parsed `ColumnType` or an `errors::Error` if the type is invalid.
pub fn validate_column_type(type_str: &str) -> Result<ColumnType, errors::Error> {
    if !TYPE_REGEX.is_match(type_str) {
        return Err(errors::Error::Syntax(format!(
            "Invalid index type: {}.",
            type_str
        )));
    }
    ColumnType::parse(type_str)
}

/// Parses a literal into a tagged value.
///
/// Quoted text is CHAR, integers are INT and decimals are FLOAT.
pub fn validate_value(value: &str) -> Result<ColumnValue, errors::Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(errors::Error::Syntax("Value cannot be empty.".to_owned()));
    }
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        return Ok(ColumnValue::Char(trimmed[1..trimmed.len() - 1].to_string()));
    }
    if INT_REGEX.is_match(trimmed) {
        return Ok(ColumnValue::Int(trimmed.parse::<i32>()?));
    }
    if FLOAT_REGEX.is_match(trimmed) {
        return Ok(ColumnValue::Float(trimmed.parse::<f32>()?));
    }
    Err(errors::Error::Syntax(format!(
        "Invalid value: {}. Text values must be enclosed in single quotes.",
        trimmed
    )))
}

/// Parses a row offset.
pub fn validate_offset(value: &str) -> Result<Offset, errors::Error> {
    value.trim().parse::<Offset>().map_err(|_| {
        errors::Error::Syntax(format!("Invalid offset: {}.", value.trim()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_names() {
        assert_eq!(validate_index_name("users_id").unwrap(), "users_id");
        assert!(validate_index_name("_x1").is_ok());
        assert!(validate_index_name("1abc").is_err());
        assert!(validate_index_name("a-b").is_err());
        assert!(validate_index_name("").is_err());
    }

    #[test]
    fn test_column_types() {
        assert_eq!(validate_column_type("int").unwrap(), ColumnType::INT);
        assert_eq!(validate_column_type("FLOAT").unwrap(), ColumnType::FLOAT);
        assert_eq!(validate_column_type("Char").unwrap(), ColumnType::CHAR);
        assert_eq!(validate_column_type("DOUBLE").unwrap_err().code(), 4000);
    }

    #[test]
    fn test_values() {
        assert_eq!(validate_value("42").unwrap(), ColumnValue::Int(42));
        assert_eq!(validate_value("-7").unwrap(), ColumnValue::Int(-7));
        assert_eq!(validate_value("2.5").unwrap(), ColumnValue::Float(2.5));
        assert_eq!(validate_value(".5").unwrap(), ColumnValue::Float(0.5));
        assert_eq!(
            validate_value("'two words'").unwrap(),
            ColumnValue::Char("two words".into())
        );
        assert_eq!(validate_value("''").unwrap(), ColumnValue::Char(String::new()));
        assert_eq!(validate_value("abc").unwrap_err().code(), 4000);
        assert_eq!(validate_value("99999999999").unwrap_err().code(), 4000);
    }

    #[test]
    fn test_offsets() {
        assert_eq!(validate_offset(" 12 ").unwrap(), 12);
        assert!(validate_offset("-1").is_err());
        assert!(validate_offset("x").is_err());
    }
}
