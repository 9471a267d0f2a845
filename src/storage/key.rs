//! Key types an index can be built over.
//!
//! Every key is a fixed-width value with a total order. The width feeds the
//! fan-out computation, so narrow keys give wider and shallower trees.
use super::column::{ColumnType, ColumnValue, MAX_CHAR_LEN};
use crate::errors::Error;
use std::cmp::Ordering;
use std::fmt;

/// Capability required from a B+ tree key.
pub trait IndexKey: Ord + Clone + fmt::Debug + fmt::Display {
    /// Declared element type of trees over this key.
    const COLUMN_TYPE: ColumnType;

    /// Width of one key in a page, in bytes.
    fn width() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Converts a tagged value into a key, rejecting values of another type.
    fn from_value(value: &ColumnValue) -> Result<Self, Error>;

    fn to_value(&self) -> ColumnValue;
}

/// Fixed-capacity string key.
pub type CharKey = heapless::String<MAX_CHAR_LEN>;

/// Builds a `CharKey`, silently truncating input longer than `MAX_CHAR_LEN` bytes.
pub fn char_key(s: &str) -> CharKey {
    let mut key = CharKey::new();
    for c in s.chars() {
        if key.push(c).is_err() {
            break;
        }
    }
    key
}

/// A 32-bit float ordered by the IEEE 754 total order.
#[derive(Debug, Clone, Copy)]
pub struct Float(pub f32);

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Float {}

impl PartialOrd for Float {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Float {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn mismatch(expected: ColumnType, value: &ColumnValue) -> Error {
    err!(
        TypeMismatch,
        "Expected {} key, got {} value {}",
        expected,
        value.column_type(),
        value
    )
}

impl IndexKey for i32 {
    const COLUMN_TYPE: ColumnType = ColumnType::INT;

    fn from_value(value: &ColumnValue) -> Result<Self, Error> {
        match value {
            ColumnValue::Int(v) => Ok(*v),
            other => Err(mismatch(Self::COLUMN_TYPE, other)),
        }
    }

    fn to_value(&self) -> ColumnValue {
        ColumnValue::Int(*self)
    }
}

impl IndexKey for Float {
    const COLUMN_TYPE: ColumnType = ColumnType::FLOAT;

    fn from_value(value: &ColumnValue) -> Result<Self, Error> {
        match value {
            ColumnValue::Float(v) => Ok(Float(*v)),
            other => Err(mismatch(Self::COLUMN_TYPE, other)),
        }
    }

    fn to_value(&self) -> ColumnValue {
        ColumnValue::Float(self.0)
    }
}

impl IndexKey for CharKey {
    const COLUMN_TYPE: ColumnType = ColumnType::CHAR;

    fn width() -> usize {
        MAX_CHAR_LEN
    }

    fn from_value(value: &ColumnValue) -> Result<Self, Error> {
        match value {
            ColumnValue::Char(v) => Ok(char_key(v)),
            other => Err(mismatch(Self::COLUMN_TYPE, other)),
        }
    }

    fn to_value(&self) -> ColumnValue {
        ColumnValue::Char(self.as_str().to_string())
    }
}
