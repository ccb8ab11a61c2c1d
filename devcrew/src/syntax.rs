//! Compile-check for generated source.
//!
//! The code is written to a scratch directory and an external command is
//! run against it (`python3 -m py_compile {file}` by default). This is a
//! parse check only; nothing is executed.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::workspace::run_command;

const CHECK_TIMEOUT: Duration = Duration::from_secs(60);

/// Placeholder replaced by the path of the file under check.
pub const FILE_PLACEHOLDER: &str = "{file}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Checker output explaining the failure.
    Invalid(String),
}

#[async_trait]
pub trait SyntaxChecker: Send + Sync {
    /// `Err` means the checker itself could not run, not that the code is bad.
    async fn check(&self, code: &str, file_name: &str) -> Result<Verdict>;
}

/// Runs an external compile command.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    command: Vec<String>,
}

impl CommandChecker {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    fn argv_for(&self, file: &str) -> Vec<String> {
        let mut argv: Vec<String> = self
            .command
            .iter()
            .map(|a| a.replace(FILE_PLACEHOLDER, file))
            .collect();
        if !self.command.iter().any(|a| a.contains(FILE_PLACEHOLDER)) {
            argv.push(file.to_string());
        }
        argv
    }
}

#[async_trait]
impl SyntaxChecker for CommandChecker {
    async fn check(&self, code: &str, file_name: &str) -> Result<Verdict> {
        let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
        let path = scratch.path().join(file_name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, code)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let argv = self.argv_for(&path.to_string_lossy());
        tracing::debug!(command = ?argv, "Running syntax check");
        let out = run_command(&argv, scratch.path(), CHECK_TIMEOUT).await?;

        Ok(if out.success {
            Verdict::Valid
        } else {
            Verdict::Invalid(out.text)
        })
    }
}

/// Accepts everything. Used when the check is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCheck;

#[async_trait]
impl SyntaxChecker for NoCheck {
    async fn check(&self, _code: &str, _file_name: &str) -> Result<Verdict> {
        Ok(Verdict::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> CommandChecker {
        CommandChecker::new(parts.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn placeholder_is_substituted_or_appended() {
        assert_eq!(
            cmd(&["python3", "-m", "py_compile", "{file}"]).argv_for("/t/main.py"),
            ["python3", "-m", "py_compile", "/t/main.py"]
        );
        assert_eq!(cmd(&["sh", "-n"]).argv_for("/t/x.sh"), ["sh", "-n", "/t/x.sh"]);
    }

    // `sh -n` parses without executing, like py_compile does for Python.
    #[tokio::test]
    async fn command_checker_flags_invalid_source() {
        let checker = cmd(&["sh", "-n", "{file}"]);
        assert_eq!(
            checker.check("echo fine\n", "ok.sh").await.unwrap(),
            Verdict::Valid
        );
        match checker.check("if then fi (\n", "bad.sh").await.unwrap() {
            Verdict::Invalid(out) => assert!(out.contains("[exit code:"), "{out}"),
            Verdict::Valid => panic!("broken script passed the check"),
        }
    }

    #[tokio::test]
    async fn nested_file_name_is_checked() {
        let checker = cmd(&["sh", "-n", "{file}"]);
        assert_eq!(
            checker.check("echo fine\n", "app/scripts/ok.sh").await.unwrap(),
            Verdict::Valid
        );
    }

    #[tokio::test]
    async fn missing_checker_program_is_error() {
        let checker = cmd(&["definitely-not-a-real-compiler-xyz", "{file}"]);
        assert!(checker.check("x", "main.py").await.is_err());
    }

    #[tokio::test]
    async fn no_check_accepts_anything() {
        assert_eq!(NoCheck.check("((((", "main.py").await.unwrap(), Verdict::Valid);
    }
}
