//! Text artifacts handed from one stage to the next.

use std::fmt;

use crate::settings::Role;

/// Free text produced by one role. Replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub producer: Role,
    pub text: String,
}

impl Artifact {
    pub fn new(producer: Role, text: impl Into<String>) -> Self {
        Self {
            producer,
            text: text.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Contents of the first fenced code block in `text`, or all of `text`
/// when there is none. An unterminated fence runs to the end. The result
/// always ends with a newline.
pub fn extract_code(text: &str) -> String {
    fenced_block(text).unwrap_or_else(|| format!("{}\n", text.trim()))
}

/// Contents of the first ``` fenced block, if any.
pub fn fenced_block(text: &str) -> Option<String> {
    let mut lines = text.lines();
    lines.by_ref().find(|l| l.trim_start().starts_with("```"))?;

    let mut body = Vec::new();
    for line in lines {
        if line.trim_start().starts_with("```") {
            break;
        }
        body.push(line);
    }
    let mut out = body.join("\n");
    out.push('\n');
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_fenced_block() {
        let text = "Here you go:\n```python\nimport os\nprint(1)\n```\nand\n```\nother\n```\n";
        assert_eq!(extract_code(text), "import os\nprint(1)\n");
    }

    #[test]
    fn bare_text_is_used_whole() {
        assert_eq!(extract_code("\nprint('hi')\n\n"), "print('hi')\n");
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        assert_eq!(extract_code("```py\na = 1\nb = 2"), "a = 1\nb = 2\n");
    }

    #[test]
    fn indented_fence_is_recognised() {
        assert_eq!(fenced_block("  ```json\n  [1]\n  ```").as_deref(), Some("  [1]\n"));
    }
}
