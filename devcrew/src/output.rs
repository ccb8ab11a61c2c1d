//! Operator-facing terminal output.
//!
//! Progress lines are prefixed with the speaking role, e.g.
//! `[architect] Planning...`. Logs go through `tracing` separately.

use std::io::{self, Write};

/// Speaker for lines that are not tied to a role.
pub const CREW: &str = "crew";

/// Wrap width for prose.
const WRAP: usize = 100;

/// Where progress goes.
pub struct Console {
    out: Box<dyn Write + Send>,
}

impl Console {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Discards everything.
    pub fn sink() -> Self {
        Self::new(Box::new(io::sink()))
    }

    /// Multi-line message, word-wrapped, every line prefixed.
    pub fn say(&mut self, speaker: &str, text: &str) -> io::Result<()> {
        for line in wrap_lines(text, WRAP) {
            writeln!(self.out, "[{speaker}] {line}")?;
        }
        self.out.flush()
    }

    /// One-line status update.
    pub fn status(&mut self, speaker: &str, emoji: &str, text: &str) -> io::Result<()> {
        writeln!(self.out, "[{speaker}] {emoji} {text}")?;
        self.out.flush()
    }

    /// A code listing, cut after `max_lines`.
    pub fn code(
        &mut self,
        speaker: &str,
        filename: &str,
        content: &str,
        max_lines: usize,
    ) -> io::Result<()> {
        let lines: Vec<&str> = content.lines().collect();
        let truncated = lines.len() > max_lines;
        let show_lines = if truncated { max_lines } else { lines.len() };

        self.status(speaker, "📄", &format!("{filename} ({} lines)", lines.len()))?;
        for line in &lines[..show_lines] {
            writeln!(self.out, "  {line}")?;
        }
        if truncated {
            writeln!(self.out, "  ... ({} more lines)", lines.len() - max_lines)?;
        }
        self.out.flush()
    }

    pub fn error(&mut self, speaker: &str, text: &str) -> io::Result<()> {
        self.status(speaker, "❌", text)
    }

    /// A boxed heading.
    pub fn banner(&mut self, title: &str) -> io::Result<()> {
        let rule = "#".repeat(title.chars().count() + 6);
        writeln!(self.out, "\n{rule}\n## {title} ##\n{rule}\n")?;
        self.out.flush()
    }
}

/// Wrap text into lines of max_len, breaking on word boundaries.
/// Blank lines are preserved.
fn wrap_lines(text: &str, max_len: usize) -> Vec<String> {
    let mut result = Vec::new();
    for line in text.lines() {
        if line.chars().count() <= max_len {
            result.push(line.to_string());
        } else {
            let mut current = String::new();
            for word in line.split_whitespace() {
                if current.chars().count() + word.chars().count() + 1 > max_len {
                    if !current.is_empty() {
                        result.push(current);
                    }
                    current = word.to_string();
                } else {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(word);
                }
            }
            if !current.is_empty() {
                result.push(current);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn wrap_breaks_on_words() {
        let lines = wrap_lines("aaa bbb ccc ddd", 7);
        assert_eq!(lines, ["aaa bbb", "ccc ddd"]);
        assert_eq!(wrap_lines("short\n\nnext", 80), ["short", "", "next"]);
    }

    #[test]
    fn say_prefixes_every_line() {
        let buf = SharedBuf::default();
        let mut console = Console::new(Box::new(buf.clone()));
        console.say("architect", "step one\nstep two").unwrap();
        assert_eq!(buf.text(), "[architect] step one\n[architect] step two\n");
    }

    #[test]
    fn code_listing_is_truncated() {
        let buf = SharedBuf::default();
        let mut console = Console::new(Box::new(buf.clone()));
        console.code("developer", "main.py", "a\nb\nc\nd", 2).unwrap();
        let text = buf.text();
        assert!(text.starts_with("[developer] 📄 main.py (4 lines)\n"));
        assert!(text.contains("  a\n  b\n"));
        assert!(!text.contains("  c\n"));
        assert!(text.ends_with("  ... (2 more lines)\n"));
    }
}
