/// The REPL (Read-Eval-Print-Loop) module.
mod buffer;
mod history;
mod prompt;

use crate::command;
use crate::console;
use crate::errors;
use crate::session;
use crate::sql;
use buffer::Buffer;
use history::History;
use prompt::Input;
use std::io::{self, BufRead, IsTerminal};
use std::time::Instant;
use tracing::{debug, info};

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER: &str = r#"
Statements end with ';'. Type 'help' or '\h' for help.
"#;

const HELP: &str = r#"List of all commands:
Note that all statements must end with ';'

CREATE INDEX name INT|FLOAT|CHAR
DROP INDEX name
INSERT INTO name VALUES (key, offset) [(key, offset) ...]
DELETE FROM name WHERE KEY = key
SELECT [*] FROM name [WHERE KEY = key | >= key | <= key | BETWEEN key AND key]
SHOW INDEXES
SHOW LEAVES name
CHECK INDEX name

?         (\h) Synonym for `help'.
quit      (\q) Quit.
"#;

#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Quit,
}

/// Runs the shell until the user quits or input ends.
pub fn start(session: &mut session::Session) -> Result<(), errors::Error> {
    info!(session_id = %session.id, "Starting REPL session...");
    if io::stdin().is_terminal() {
        interactive(session)?;
    } else {
        batch(session, io::stdin().lock())?;
    }
    info!(session_id = %session.id, "Finished REPL session.");
    Ok(())
}

fn interactive(session: &mut session::Session) -> Result<(), errors::Error> {
    console::echo(format!("Welcome to the {} {} shell.\n", NAME, VERSION));
    console::echo_lines(BANNER.to_string());

    let path = history::get_home_file(format!(".{}_history", NAME));
    let mut history = History::open(path);
    debug!(entries = history.len(), "Loaded history.");

    let mut buffer = Buffer::new();
    loop {
        match prompt::readline(!buffer.is_empty(), &mut history)? {
            Input::Line(line) => buffer.push_line(&line),
            Input::Cancel => {
                buffer.clear();
                continue;
            }
            Input::Eof => {
                console::echo("Bye\n".into());
                return Ok(());
            }
        }
        if !buffer.is_complete() {
            continue;
        }
        let text = buffer.build();
        buffer.clear();
        history.append(&text);
        if dispatch(session, &text) == Flow::Quit {
            console::echo("Bye\n".into());
            return Ok(());
        }
    }
}

/// Reads statements from a non-interactive source such as a pipe.
fn batch<R: BufRead>(session: &mut session::Session, input: R) -> Result<(), errors::Error> {
    let mut buffer = Buffer::new();
    for line in input.lines() {
        buffer.push_line(&line?);
        if buffer.is_complete() {
            let text = buffer.build();
            buffer.clear();
            if dispatch(session, &text) == Flow::Quit {
                return Ok(());
            }
        }
    }
    if !buffer.is_empty() {
        dispatch(session, &buffer.build());
    }
    Ok(())
}

fn dispatch(session: &mut session::Session, text: &str) -> Flow {
    if buffer::is_shell_command(text) {
        let cmd = text.trim_end_matches(';').trim().to_lowercase();
        match cmd.as_str() {
            "quit" | "exit" | "\\q" => return Flow::Quit,
            "help" | "?" | "\\h" => console::echo_lines(HELP.to_string()),
            _ => {
                console::error(format!("Unrecognized command: {}\n", cmd));
                console::echo_lines(HELP.to_string());
            }
        }
        return Flow::Continue;
    }
    run_statement(session, text);
    Flow::Continue
}

/// Parses, executes and prints one statement.
pub fn run_statement(session: &mut session::Session, text: &str) {
    match execute_statement(session, text) {
        Ok(output) => console::echo(output),
        Err(e) => console::error(format!("{}\n", e)),
    }
}

fn execute_statement(session: &mut session::Session, text: &str) -> Result<String, errors::Error> {
    let start = Instant::now();
    let c = sql::parse(text.to_string())?;
    let result = command::execute(session, c)?;
    Ok(console::format_result(&result, start.elapsed()))
}
