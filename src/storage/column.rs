use crate::errors::Error;
use bincode::{Decode, Encode};
use std::fmt;

/// Maximum width of a CHAR key in bytes.
pub const MAX_CHAR_LEN: usize = 256;

/// Declared element type of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    INT,   // i32
    FLOAT, // 32-bit floating point
    CHAR,  // Fixed-width string, up to MAX_CHAR_LEN bytes
}

/// A tagged column value as handed over by the caller of an index.
#[derive(Encode, Decode, Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int(i32),
    Float(f32),
    Char(String),
}

impl ColumnType {
    /// Single-byte tag used in snapshot headers.
    pub fn tag(&self) -> u8 {
        match self {
            ColumnType::INT => 1,
            ColumnType::FLOAT => 2,
            ColumnType::CHAR => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Result<ColumnType, Error> {
        match tag {
            1 => Ok(ColumnType::INT),
            2 => Ok(ColumnType::FLOAT),
            3 => Ok(ColumnType::CHAR),
            invalid => Err(err!(Encoding, "Invalid column type tag: {}", invalid)),
        }
    }

    pub fn parse(s: &str) -> Result<ColumnType, Error> {
        match s.to_uppercase().as_str() {
            "INT" | "INTEGER" => Ok(ColumnType::INT),
            "FLOAT" => Ok(ColumnType::FLOAT),
            "CHAR" | "VARCHAR" => Ok(ColumnType::CHAR),
            _ => Err(err!(Syntax, "Unsupported index type: {}.", s)),
        }
    }
}

impl ColumnValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValue::Int(_) => ColumnType::INT,
            ColumnValue::Float(_) => ColumnType::FLOAT,
            ColumnValue::Char(_) => ColumnType::CHAR,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::INT => write!(f, "INT"),
            ColumnType::FLOAT => write!(f, "FLOAT"),
            ColumnType::CHAR => write!(f, "CHAR({})", MAX_CHAR_LEN),
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Int(v) => write!(f, "{}", v),
            ColumnValue::Float(v) => write!(f, "{}", v),
            ColumnValue::Char(v) => write!(f, "'{}'", v),
        }
    }
}
