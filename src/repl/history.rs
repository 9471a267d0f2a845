use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Retrieves a file path in the user's home directory.
///
/// Returns `None` if the home directory cannot be determined.
pub fn get_home_file(filename: String) -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(filename))
}

/// Appends a line to the history file.
///
/// # Errors
/// Returns an `io::Error` if the file cannot be opened or written to
pub fn append_history(line: &str, path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", line.trim())?;
    writer.flush()?;
    Ok(())
}

/// Loads the statement history from a file.
///
/// Returns an empty vector if the file cannot be opened or read.
pub fn load_history(path: &Path) -> Vec<String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return Vec::new(),
    };

    let reader = BufReader::new(file);
    reader
        .lines()
        .filter_map(|line| {
            line.ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .collect()
}

/// Statements entered so far, with a cursor for Up/Down navigation.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    path: Option<PathBuf>,
    index: usize,
}

impl History {
    /// History backed by `path`; `None` keeps it in memory only.
    pub fn open(path: Option<PathBuf>) -> Self {
        let entries = path.as_deref().map(load_history).unwrap_or_default();
        let index = entries.len();
        Self {
            entries,
            path,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records a statement and resets navigation to the end.
    pub fn append(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.entries.push(line.to_string());
        self.index = self.entries.len();
        if let Some(path) = &self.path {
            if let Err(e) = append_history(line, path) {
                warn!(path = %path.display(), "Failed to save history. {}", e);
            }
        }
    }

    /// Steps back in history.
    pub fn previous(&mut self) -> Option<&str> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index).map(String::as_str)
    }

    /// Steps forward; `None` once past the newest entry.
    pub fn next(&mut self) -> Option<&str> {
        if self.index < self.entries.len() {
            self.index += 1;
        }
        self.entries.get(self.index).map(String::as_str)
    }
}
