use super::statement::*;
use super::tokenizer;
use super::validator;
use crate::errors;
use std::collections::VecDeque;

/// Parses an `INSERT` statement from tokenized input.
///
/// # Arguments
/// * `sql` - A mutable `VecDeque<String>` of tokens.
///
/// # Returns
/// A `Result` containing the parsed `InsertStatement` or an `errors::Error`.
fn parse_insert(sql: &mut VecDeque<String>) -> Result<InsertStatement, errors::Error> {
    expect_token(sql, "INTO", "'INSERT' must be followed by 'INTO'.")?;
    let index = validator::validate_index_name(&pop_token(
        sql,
        "'INSERT INTO' must be followed by an index name.",
    )?)?;
    expect_token(
        sql,
        "VALUES",
        "'INSERT INTO index' must be followed by 'VALUES'.",
    )?;
    let entries = parse_entries(sql)?;
    Ok(InsertStatement { index, entries })
}

/// Parses a `SELECT` statement from tokenized input.
///
/// # Arguments
/// * `sql` - A mutable `VecDeque<String>` of tokens.
///
/// # Returns
/// A `Result` containing the parsed `SelectStatement` or an `errors::Error`.
fn parse_select(sql: &mut VecDeque<String>) -> Result<SelectStatement, errors::Error> {
    if sql.front().map_or(false, |t| t == "*") {
        sql.pop_front(); // Consume "*"
    }
    expect_token(sql, "FROM", "'SELECT' must be followed by 'FROM'.")?;
    let index = validator::validate_index_name(&pop_token(
        sql,
        "'SELECT FROM' must be followed by an index name.",
    )?)?;
    let filter = if sql.is_empty() {
        KeyFilter::All
    } else {
        parse_where_clause(sql)?
    };
    Ok(SelectStatement { index, filter })
}

/// Parses a `DELETE` statement from tokenized input.
///
/// # Arguments
/// * `tokens` - A mutable `VecDeque<String>` of tokens.
///
/// # Returns
/// A `Result` containing the parsed `DeleteStatement` or an `errors::Error`.
fn parse_delete(tokens: &mut VecDeque<String>) -> Result<DeleteStatement, errors::Error> {
    expect_token(tokens, "FROM", "'DELETE' must be followed by 'FROM'.")?;
    let index = validator::validate_index_name(&pop_token(
        tokens,
        "'DELETE FROM' must be followed by an index name.",
    )?)?;
    match parse_where_clause(tokens)? {
        KeyFilter::Equal(key) => Ok(DeleteStatement { index, key }),
        _ => Err(errors::Error::Syntax(
            "'DELETE' only supports 'WHERE KEY = value'.".to_owned(),
        )),
    }
}

/// Parses a `CREATE INDEX` statement from tokenized input.
///
/// # Arguments
/// * `sql` - A mutable `VecDeque<String>` of tokens.
///
/// # Returns
/// A `Result` containing the parsed `CreateStatement` or an `errors::Error`.
fn parse_create(sql: &mut VecDeque<String>) -> Result<CreateStatement, errors::Error> {
    expect_token(sql, "INDEX", "'CREATE' must be followed by 'INDEX'.")?;
    let name = validator::validate_index_name(&pop_token(
        sql,
        "'CREATE INDEX' must be followed by an index name.",
    )?)?;
    let column = validator::validate_column_type(&pop_token(
        sql,
        "'CREATE INDEX name' must be followed by a type (INT, FLOAT or CHAR).",
    )?)?;
    Ok(CreateStatement { name, column })
}

/// Parses a `SHOW` statement from tokenized input.
///
/// # Arguments
/// * `tokens` - A mutable `VecDeque<String>` of tokens.
///
/// # Returns
/// A `Result` containing the parsed `ShowStatement` or an `errors::Error`.
fn parse_show(tokens: &mut VecDeque<String>) -> Result<ShowStatement, errors::Error> {
    let entity = pop_token(tokens, "'SHOW' must specify 'INDEXES' or 'LEAVES'.")?.to_uppercase();
    match entity.as_str() {
        "INDEXES" => Ok(ShowStatement::ShowIndexesStatement),
        "LEAVES" => {
            let name = pop_token(tokens, "'SHOW LEAVES' must be followed by an index name.")?;
            Ok(ShowStatement::ShowLeavesStatement(
                validator::validate_index_name(&name)?,
            ))
        }
        _ => Err(errors::Error::Syntax(format!(
            "Unknown entity to show: {}.",
            entity
        ))),
    }
}

/// Parses a `DROP INDEX` statement from tokenized input.
fn parse_drop(tokens: &mut VecDeque<String>) -> Result<DropStatement, errors::Error> {
    expect_token(tokens, "INDEX", "'DROP' must be followed by 'INDEX'.")?;
    let name = pop_token(tokens, "'DROP INDEX' must be followed by a name.")?;
    Ok(DropStatement {
        name: validator::validate_index_name(&name)?,
    })
}

/// Parses a `CHECK INDEX` statement from tokenized input.
fn parse_check(tokens: &mut VecDeque<String>) -> Result<CheckStatement, errors::Error> {
    expect_token(tokens, "INDEX", "'CHECK' must be followed by 'INDEX'.")?;
    let name = pop_token(tokens, "'CHECK INDEX' must be followed by a name.")?;
    Ok(CheckStatement {
        name: validator::validate_index_name(&name)?,
    })
}

/// Helper function to expect and consume a specific token.
///
/// # Arguments
/// * `tokens` - The token queue.
/// * `expected` - The token to expect (case-insensitive).
/// * `error_msg` - The error message if the token is not found.
///
/// # Returns
/// A `Result` indicating success or an `errors::Error`.
fn expect_token(
    tokens: &mut VecDeque<String>,
    expected: &str,
    error_msg: &str,
) -> Result<(), errors::Error> {
    match tokens.pop_front() {
        Some(token) if token.to_uppercase() == expected.to_uppercase() => Ok(()),
        _ => Err(errors::Error::Syntax(error_msg.to_owned())),
    }
}

/// Helper function to pop a token or return an error.
///
/// # Arguments
/// * `tokens` - The token queue.
/// * `error_msg` - The error message if no token is available.
///
/// # Returns
/// A `Result` containing the token or an `errors::Error`.
fn pop_token(tokens: &mut VecDeque<String>, error_msg: &str) -> Result<String, errors::Error> {
    tokens
        .pop_front()
        .ok_or_else(|| errors::Error::Syntax(error_msg.to_owned()))
}

/// Parses `(key, offset)` groups until the end of the statement.
fn parse_entries(
    tokens: &mut VecDeque<String>,
) -> Result<Vec<(crate::storage::ColumnValue, crate::storage::Offset)>, errors::Error> {
    let values_sql = tokens.drain(..).collect::<Vec<_>>().join(" ");
    let groups = tokenizer::split_groups(&values_sql)?;
    if groups.is_empty() {
        return Err(errors::Error::Syntax(
            "'VALUES' must be followed by (key, offset) pairs in parentheses.".to_owned(),
        ));
    }
    groups
        .iter()
        .map(|group| match tokenizer::split_values(group).as_slice() {
            [key, offset] => Ok((
                validator::validate_value(key)?,
                validator::validate_offset(offset)?,
            )),
            other => Err(errors::Error::Syntax(format!(
                "Expected (key, offset), got {} value(s).",
                other.len()
            ))),
        })
        .collect()
}

/// Parses a `WHERE KEY ...` clause.
///
/// # Arguments
/// * `sql` - The token queue.
///
/// # Returns
/// A `Result` containing the key condition or an `errors::Error`.
fn parse_where_clause(sql: &mut VecDeque<String>) -> Result<KeyFilter, errors::Error> {
    expect_token(sql, "WHERE", "Expected 'WHERE' clause.")?;
    expect_token(sql, "KEY", "'WHERE' must be followed by 'KEY'.")?;
    let operator = pop_token(sql, "'WHERE KEY' must be followed by an operator.")?.to_uppercase();
    let first = validator::validate_value(&pop_token(
        sql,
        &format!("'KEY {}' must be followed by a value.", operator),
    )?)?;
    match operator.as_str() {
        "=" => Ok(KeyFilter::Equal(first)),
        ">=" => Ok(KeyFilter::AtLeast(first)),
        "<=" => Ok(KeyFilter::AtMost(first)),
        "BETWEEN" => {
            expect_token(sql, "AND", "'BETWEEN value' must be followed by 'AND'.")?;
            let second = validator::validate_value(&pop_token(
                sql,
                "'BETWEEN value AND' must be followed by a value.",
            )?)?;
            Ok(KeyFilter::Between(first, second))
        }
        _ => Err(errors::Error::Syntax(format!(
            "Unsupported operator: {}. Use =, >=, <= or BETWEEN.",
            operator
        ))),
    }
}

/// Parses a full statement.
///
/// # Arguments
/// * `raw_sql` - The raw statement to parse.
///
/// # Returns
/// A `Result` containing the parsed `SqlCommand` or an `errors::Error`.
pub fn parse(raw_sql: String) -> Result<SqlCommand, errors::Error> {
    let trimmed = raw_sql.trim();
    let mut tokens = tokenizer::tokenize_sql(trimmed.strip_suffix(';').unwrap_or(trimmed))?;

    let first = pop_token(&mut tokens, "Statement cannot be empty.")?.to_uppercase();
    let statement = match first.as_str() {
        "SELECT" => Statement::Select(parse_select(&mut tokens)?),
        "INSERT" => Statement::Insert(parse_insert(&mut tokens)?),
        "DELETE" => Statement::Delete(parse_delete(&mut tokens)?),
        "CREATE" => Statement::Create(parse_create(&mut tokens)?),
        "DROP" => Statement::Drop(parse_drop(&mut tokens)?),
        "SHOW" => Statement::Show(parse_show(&mut tokens)?),
        "CHECK" => Statement::Check(parse_check(&mut tokens)?),
        _ => {
            return Err(errors::Error::Syntax(format!(
                "Unrecognized statement: {}.",
                first
            )))
        }
    };
    if !tokens.is_empty() {
        return Err(errors::Error::Syntax(
            "Unexpected tokens after statement.".to_owned(),
        ));
    }
    Ok(SqlCommand {
        statement,
        sql: raw_sql,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ColumnType, ColumnValue};

    fn statement(sql: &str) -> Statement {
        parse(sql.to_string()).unwrap().statement
    }

    #[test]
    fn test_parse_create_and_drop() {
        assert_eq!(
            statement("create index ids int;"),
            Statement::Create(CreateStatement {
                name: "ids".into(),
                column: ColumnType::INT
            })
        );
        assert_eq!(
            statement("DROP INDEX ids"),
            Statement::Drop(DropStatement { name: "ids".into() })
        );
        assert!(parse("CREATE TABLE t INT".into()).is_err());
        assert!(parse("CREATE INDEX t BLOB".into()).is_err());
        assert!(parse("CREATE INDEX 9t INT".into()).is_err());
    }

    #[test]
    fn test_parse_insert() {
        let parsed = statement("INSERT INTO names VALUES ('ada lovelace', 1), ('bob', 2);");
        assert_eq!(
            parsed,
            Statement::Insert(InsertStatement {
                index: "names".into(),
                entries: vec![
                    (ColumnValue::Char("ada lovelace".into()), 1),
                    (ColumnValue::Char("bob".into()), 2),
                ],
            })
        );
        let parsed = statement("INSERT INTO n VALUES (1.5, 10) (-2, 20)");
        match parsed {
            Statement::Insert(i) => {
                assert_eq!(i.entries[0], (ColumnValue::Float(1.5), 10));
                assert_eq!(i.entries[1], (ColumnValue::Int(-2), 20));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("INSERT INTO n VALUES".into()).is_err());
        assert!(parse("INSERT INTO n VALUES (1)".into()).is_err());
        assert!(parse("INSERT INTO n VALUES (1, 2, 3)".into()).is_err());
        assert!(parse("INSERT INTO n VALUES (1, -2)".into()).is_err());
    }

    #[test]
    fn test_parse_select_filters() {
        let filter = |sql: &str| match statement(sql) {
            Statement::Select(s) => s.filter,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(filter("SELECT FROM a"), KeyFilter::All);
        assert_eq!(filter("SELECT * FROM a;"), KeyFilter::All);
        assert_eq!(
            filter("select from a where key = 3"),
            KeyFilter::Equal(ColumnValue::Int(3))
        );
        assert_eq!(
            filter("SELECT FROM a WHERE KEY BETWEEN 'a' AND 'm'"),
            KeyFilter::Between(ColumnValue::Char("a".into()), ColumnValue::Char("m".into()))
        );
        assert_eq!(
            filter("SELECT FROM a WHERE KEY >= 1.5"),
            KeyFilter::AtLeast(ColumnValue::Float(1.5))
        );
        assert_eq!(
            filter("SELECT FROM a WHERE KEY <= 0"),
            KeyFilter::AtMost(ColumnValue::Int(0))
        );
        assert!(parse("SELECT FROM a WHERE KEY > 1".into()).is_err());
        assert!(parse("SELECT FROM a WHERE KEY BETWEEN 1 2".into()).is_err());
        assert!(parse("SELECT FROM a WHERE KEY = 1 extra".into()).is_err());
    }

    #[test]
    fn test_parse_delete_show_check() {
        assert_eq!(
            statement("DELETE FROM a WHERE KEY = 'x'"),
            Statement::Delete(DeleteStatement {
                index: "a".into(),
                key: ColumnValue::Char("x".into())
            })
        );
        assert!(parse("DELETE FROM a WHERE KEY >= 1".into()).is_err());
        assert!(parse("DELETE FROM a".into()).is_err());
        assert_eq!(
            statement("SHOW INDEXES"),
            Statement::Show(ShowStatement::ShowIndexesStatement)
        );
        assert_eq!(
            statement("show leaves a"),
            Statement::Show(ShowStatement::ShowLeavesStatement("a".into()))
        );
        assert_eq!(
            statement("CHECK INDEX a;"),
            Statement::Check(CheckStatement { name: "a".into() })
        );
        assert!(parse("".into()).is_err());
        assert!(parse("UPDATE a".into()).is_err());
    }
}
