use crate::storage::{ColumnType, ColumnValue, Offset};

/// A parsed statement together with the text it was parsed from.
#[derive(Debug)]
pub struct SqlCommand {
    pub statement: Statement,
    pub sql: String,
}

/// Statement types supported by the parser.
#[derive(Debug, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Delete(DeleteStatement),
    Create(CreateStatement),
    Drop(DropStatement),
    Show(ShowStatement),
    Check(CheckStatement),
}

/// `CREATE INDEX name TYPE`
#[derive(Debug, PartialEq)]
pub struct CreateStatement {
    pub name: String,
    pub column: ColumnType,
}

/// `DROP INDEX name`
#[derive(Debug, PartialEq)]
pub struct DropStatement {
    pub name: String,
}

/// Variants of `SHOW` statements.
#[derive(Debug, PartialEq)]
pub enum ShowStatement {
    ShowIndexesStatement,
    /// Leaf level of one index.
    ShowLeavesStatement(String),
}

/// `INSERT INTO index VALUES (key, offset) ...`
#[derive(Debug, PartialEq)]
pub struct InsertStatement {
    pub index: String,
    pub entries: Vec<(ColumnValue, Offset)>,
}

/// `DELETE FROM index WHERE KEY = key`
#[derive(Debug, PartialEq)]
pub struct DeleteStatement {
    pub index: String,
    pub key: ColumnValue,
}

/// Key condition of a `SELECT`. Bounds are inclusive.
#[derive(Debug, PartialEq)]
pub enum KeyFilter {
    All,
    Equal(ColumnValue),
    Between(ColumnValue, ColumnValue),
    AtLeast(ColumnValue),
    AtMost(ColumnValue),
}

/// `SELECT FROM index [WHERE ...]`
#[derive(Debug, PartialEq)]
pub struct SelectStatement {
    pub index: String,
    pub filter: KeyFilter,
}

/// `CHECK INDEX name`
#[derive(Debug, PartialEq)]
pub struct CheckStatement {
    pub name: String,
}
