use crate::errors;
use crate::index::IndexManager;
use crate::session;
use crate::sql::{self, KeyFilter, SelectStatement, ShowStatement, Statement};
use crate::storage::{ColumnValue, Offset};
use tracing::{debug, trace};

#[derive(Debug, PartialEq)]
pub enum SqlResult {
    /// OK response from CREATE/DROP/INSERT/DELETE
    Ok { affected_rows: u64 },
    /// Result set from SELECT-like queries
    ResultSet {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

/// Execute a statement.
pub fn execute(
    session: &mut session::Session,
    c: sql::SqlCommand,
) -> Result<SqlResult, errors::Error> {
    trace!(session_id = %session.id, sql = c.sql.as_str(), "Executing statement...");
    let indexes = &mut session.indexes;
    match c.statement {
        Statement::Create(s) => {
            indexes.create_index(&s.name, s.column)?;
            Ok(SqlResult::Ok { affected_rows: 0 })
        }
        Statement::Drop(s) => {
            indexes.drop_index(&s.name)?;
            Ok(SqlResult::Ok { affected_rows: 0 })
        }
        Statement::Insert(i) => {
            let (keys, offsets): (Vec<ColumnValue>, Vec<Offset>) = i.entries.into_iter().unzip();
            let inserted = indexes.insert_batch(&i.index, &keys, &offsets)?;
            Ok(SqlResult::Ok {
                affected_rows: inserted as u64,
            })
        }
        Statement::Delete(d) => {
            let offset = indexes.delete_index(&d.index, &d.key)?;
            debug!(index = d.index.as_str(), key = %d.key, offset, "Deleted key.");
            Ok(SqlResult::Ok { affected_rows: 1 })
        }
        Statement::Select(s) => execute_select(indexes, s),
        Statement::Show(ShowStatement::ShowIndexesStatement) => {
            let columns = ["Index", "Type", "Keys", "Height", "Nodes", "Degree"]
                .iter()
                .map(|c| c.to_string())
                .collect();
            let rows = indexes
                .describe()
                .into_iter()
                .map(|i| {
                    vec![
                        i.name,
                        i.column.to_string(),
                        i.keys.to_string(),
                        i.height.to_string(),
                        i.nodes.to_string(),
                        i.degree.to_string(),
                    ]
                })
                .collect();
            Ok(SqlResult::ResultSet { columns, rows })
        }
        Statement::Show(ShowStatement::ShowLeavesStatement(name)) => {
            let rows = indexes
                .leaves(&name)?
                .into_iter()
                .enumerate()
                .map(|(i, leaf)| vec![i.to_string(), leaf])
                .collect();
            Ok(SqlResult::ResultSet {
                columns: vec!["Leaf".into(), "Keys".into()],
                rows,
            })
        }
        Statement::Check(c) => {
            indexes.check(&c.name)?;
            Ok(SqlResult::ResultSet {
                columns: vec!["Index".into(), "Status".into()],
                rows: vec![vec![c.name, "OK".into()]],
            })
        }
    }
}

fn execute_select(
    indexes: &IndexManager,
    s: SelectStatement,
) -> Result<SqlResult, errors::Error> {
    let offsets = match s.filter {
        KeyFilter::All => {
            let rows = indexes
                .scan(&s.index)?
                .into_iter()
                .map(|(key, offset)| vec![key.to_string(), offset.to_string()])
                .collect();
            return Ok(SqlResult::ResultSet {
                columns: vec!["Key".into(), "Offset".into()],
                rows,
            });
        }
        KeyFilter::Equal(key) => indexes.search_equal(&s.index, &key)?.into_iter().collect(),
        KeyFilter::Between(begin, end) => indexes.search_between(&s.index, &begin, &end)?,
        KeyFilter::AtLeast(begin) => indexes.search_greater(&s.index, &begin)?,
        KeyFilter::AtMost(end) => indexes.search_smaller(&s.index, &end)?,
    };
    Ok(offset_rows(offsets))
}

fn offset_rows(offsets: Vec<Offset>) -> SqlResult {
    SqlResult::ResultSet {
        columns: vec!["Offset".into()],
        rows: offsets.into_iter().map(|o| vec![o.to_string()]).collect(),
    }
}
