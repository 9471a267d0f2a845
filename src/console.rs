/// Terminal output for the shell.
use crate::command::SqlResult;
use crossterm::{
    style::{self, Color},
    ExecutableCommand,
};
use std::io::{self, Write};
use std::time::Duration;

const NAME: &str = env!("CARGO_PKG_NAME");

/// Prints the statement prompt, or the continuation prompt inside a multi-line statement.
pub fn print_prompt(continuation: bool) -> io::Result<()> {
    let prompt = if continuation {
        format!("{}-> ", " ".repeat(NAME.len() - 1))
    } else {
        format!("{}> ", NAME)
    };
    io::stdout()
        .execute(style::SetAttribute(style::Attribute::Bold))?
        .execute(style::SetForegroundColor(Color::Green))?
        .execute(style::Print(prompt))?
        .execute(style::SetAttribute(style::Attribute::Reset))?
        .execute(style::ResetColor)?;
    io::stdout().flush()?;
    Ok(())
}

pub fn echo(s: String) {
    if io::stdout().execute(style::Print(s)).is_err() {
        return;
    }
    let _ = io::stdout().flush();
}

pub fn error(s: String) {
    let mut stdout = io::stdout();
    let _ = stdout
        .execute(style::SetForegroundColor(Color::Red))
        .and_then(|out| out.execute(style::Print(s)))
        .and_then(|out| out.execute(style::ResetColor));
    let _ = stdout.flush();
}

pub fn echo_lines(s: String) {
    for l in s.lines() {
        if io::stdout().execute(style::Print(format!("{}\n", l))).is_err() {
            continue;
        }
    }
    let _ = io::stdout().flush();
}

pub fn echo_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut result = String::new();

    // Determine the width of each column by finding the longest string in each
    let mut column_widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, col) in row.iter().enumerate() {
            if i < column_widths.len() {
                column_widths[i] = column_widths[i].max(col.chars().count());
            }
        }
    }

    let border = {
        let mut line = String::from("+");
        for width in &column_widths {
            line.push_str(&"-".repeat(*width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };

    result.push_str(&border);
    if !headers.is_empty() {
        result.push('|');
        for (i, header) in headers.iter().enumerate() {
            result.push_str(&format!(" {:<width$} |", header, width = column_widths[i]));
        }
        result.push('\n');
        result.push_str(&border);
    }
    for row in rows {
        result.push('|');
        for (i, col) in row.iter().enumerate().take(column_widths.len()) {
            result.push_str(&format!(" {:<width$} |", col, width = column_widths[i]));
        }
        result.push('\n');
    }
    result.push_str(&border);
    result
}

/// Renders a statement result the way the shell prints it.
pub fn format_result(result: &SqlResult, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    match result {
        SqlResult::Ok { affected_rows } => format!(
            "Query OK, {} {} affected ({:.2} sec)\n",
            affected_rows,
            if *affected_rows == 1 { "row" } else { "rows" },
            secs
        ),
        SqlResult::ResultSet { rows, .. } if rows.is_empty() => {
            format!("Empty set ({:.2} sec)\n", secs)
        }
        SqlResult::ResultSet { columns, rows } => format!(
            "{}{} {} in set ({:.2} sec)\n",
            echo_table(columns, rows),
            rows.len(),
            if rows.len() == 1 { "row" } else { "rows" },
            secs
        ),
    }
}

#[macro_export]
macro_rules! echo {
    ($($arg:tt)*) => {
        crate::console::echo(format!($($arg)*))
    };
}
