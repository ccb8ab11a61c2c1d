//! Project directory for generated code, plus the command runner used by
//! the syntax check.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;

/// Output is truncated past this many bytes.
const MAX_OUTPUT: usize = 8000;

/// The final code artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOutput {
    pub path: PathBuf,
    pub bytes: usize,
}

/// Directory the generated project lives in.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
}

impl Workspace {
    /// Create the workspace directory if it does not exist.
    pub async fn create(root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("Failed to create {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Write a file relative to the workspace root, replacing any previous
    /// contents.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<ProjectOutput> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content)
            .await
            .with_context(|| format!("Failed to write {}", full.display()))?;
        Ok(ProjectOutput {
            path: full,
            bytes: content.len(),
        })
    }
}

/// What a finished command produced.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    /// stdout, then stderr prefixed with `[stderr]`.
    pub text: String,
}

/// Run `argv` in `cwd`, capturing output. `argv[0]` is the program.
pub async fn run_command(argv: &[String], cwd: &Path, timeout: Duration) -> Result<CommandOutput> {
    let (program, args) = argv.split_first().context("Empty command")?;
    let output = tokio::time::timeout(
        timeout,
        Command::new(program)
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .context("Command timed out")?
    .with_context(|| format!("Failed to execute {program}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let mut text = String::new();
    if !stdout.is_empty() {
        text.push_str(&stdout);
    }
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("[stderr] ");
        text.push_str(&stderr);
    }
    if !output.status.success() {
        text.push_str(&format!("\n[exit code: {}]", output.status.code().unwrap_or(-1)));
    }

    if text.len() > MAX_OUTPUT {
        let mut cut = MAX_OUTPUT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("\n... (truncated)");
    }

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        text,
    })
}
