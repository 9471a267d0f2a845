/// Lines of a statement that may span several prompts.
#[derive(Debug, Default)]
pub struct Buffer {
    lines: Vec<String>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all lines from the buffer.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Adds a line; blank lines are dropped.
    pub fn push_line(&mut self, line: &str) {
        if !line.trim().is_empty() {
            self.lines.push(line.trim().to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// A statement is complete once it ends with `;`, or right away for a
    /// shell command such as `help` or `\q`.
    pub fn is_complete(&self) -> bool {
        let text = self.build();
        if text.is_empty() {
            return false;
        }
        text.ends_with(';') || (self.lines.len() == 1 && is_shell_command(&text))
    }

    /// Combines all lines into a single String with spaces between lines.
    pub fn build(&self) -> String {
        self.lines.join(" ").trim().to_string()
    }

    /// Returns the number of lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Shell commands that do not need a terminating `;`.
pub fn is_shell_command(text: &str) -> bool {
    let word = text.trim_end_matches(';').trim().to_lowercase();
    word.starts_with('\\') || matches!(word.as_str(), "help" | "?" | "quit" | "exit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiline_statement() {
        let mut buffer = Buffer::new();
        buffer.push_line("SELECT FROM ids");
        assert!(!buffer.is_complete());
        buffer.push_line("   ");
        buffer.push_line("  WHERE KEY = 1;");
        assert!(buffer.is_complete());
        assert_eq!(buffer.line_count(), 2);
        assert_eq!(buffer.build(), "SELECT FROM ids WHERE KEY = 1;");
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.is_complete());
    }

    #[test]
    fn test_shell_commands() {
        for cmd in ["help", "?", "\\q", "EXIT", "quit;"] {
            let mut buffer = Buffer::new();
            buffer.push_line(cmd);
            assert!(buffer.is_complete(), "{}", cmd);
        }
        let mut buffer = Buffer::new();
        buffer.push_line("SELECT FROM a");
        buffer.push_line("exit");
        assert!(!buffer.is_complete());
    }
}
