//! The generated app, served as a subprocess for QA.

use std::path::{Component, Path};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Poll interval while waiting for the server to answer.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Timeout for each readiness request.
const READY_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Keep at most this much server stderr for the report.
const STDERR_CAP: usize = 4000;

/// Placeholder in the server command for the app's import path.
pub const MODULE_PLACEHOLDER: &str = "{module}";

/// A base URL that has answered at least one HTTP request.
///
/// Only [`wait_for_endpoint`] and [`AppServer::wait_ready`] construct this,
/// so holding one proves the readiness check passed.
#[derive(Debug, Clone)]
pub struct ReadyEndpoint {
    base_url: String,
}

impl ReadyEndpoint {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.base_url)
        } else {
            format!("{}/{endpoint}", self.base_url)
        }
    }
}

/// Wait until `base_url` answers any HTTP request, or `timeout` passes.
pub async fn wait_for_endpoint(
    http: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> Result<ReadyEndpoint> {
    poll_ready(http, base_url, Duration::ZERO, timeout, || None).await
}

/// Shared readiness loop.
///
/// Nothing is requested until `grace` has passed. `exited` reports a reason
/// when the process behind the URL is gone; it is checked before every
/// request and again after a successful one, so an answer from some other
/// process holding the port is never taken as ready.
async fn poll_ready<F>(
    http: &reqwest::Client,
    base_url: &str,
    grace: Duration,
    timeout: Duration,
    mut exited: F,
) -> Result<ReadyEndpoint>
where
    F: FnMut() -> Option<String>,
{
    let base_url = base_url.trim_end_matches('/').to_string();
    let settled = tokio::time::Instant::now() + grace;
    let deadline = settled + timeout;
    loop {
        if let Some(reason) = exited() {
            anyhow::bail!("server failed to start: {reason}");
        }

        if tokio::time::Instant::now() >= settled {
            match http
                .get(&base_url)
                .timeout(READY_CHECK_TIMEOUT)
                .send()
                .await
            {
                Ok(resp) => {
                    if let Some(reason) = exited() {
                        anyhow::bail!("server failed to start: {reason}");
                    }
                    tracing::info!(url = %base_url, status = %resp.status(), "Server is ready");
                    return Ok(ReadyEndpoint { base_url });
                }
                Err(e) => tracing::trace!(url = %base_url, error = %e, "Server not ready yet"),
            }
        }

        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!(
                "server at {base_url} not reachable after {}s",
                timeout.as_secs_f32()
            );
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Fill `{module}` in a server command with the import path of
/// `file_name`: the extension is dropped and directories become dots.
pub fn server_argv(command: &[String], file_name: &str) -> Vec<String> {
    let stem = Path::new(file_name).with_extension("");
    let module = stem
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(".");
    command
        .iter()
        .map(|a| a.replace(MODULE_PLACEHOLDER, &module))
        .collect()
}

/// A running app server process.
pub struct AppServer {
    child: Child,
    base_url: String,
    stderr: Arc<Mutex<String>>,
}

impl AppServer {
    /// Launch `argv` in `cwd`. The process serves `base_url` once ready.
    pub fn spawn(argv: &[String], cwd: &Path, base_url: &str) -> Result<Self> {
        let (program, args) = argv.split_first().context("Empty server command")?;
        tracing::info!(command = ?argv, cwd = %cwd.display(), "Starting app server");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {program}"))?;

        let stderr = Arc::new(Mutex::new(String::new()));
        if let Some(pipe) = child.stderr.take() {
            let sink = Arc::clone(&stderr);
            tokio::spawn(async move {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "devcrew::qa::server", "{line}");
                    if let Ok(mut buf) = sink.lock()
                        && buf.len() < STDERR_CAP
                    {
                        buf.push_str(&line);
                        buf.push('\n');
                    }
                }
            });
        }

        Ok(Self {
            child,
            base_url: base_url.to_string(),
            stderr,
        })
    }

    /// Poll until the server answers, starting once the process has stayed
    /// up for `grace`. Fails early if the process exits.
    pub async fn wait_ready(
        &mut self,
        http: &reqwest::Client,
        grace: Duration,
        timeout: Duration,
    ) -> Result<ReadyEndpoint> {
        let child = &mut self.child;
        let stderr = &self.stderr;
        poll_ready(http, &self.base_url, grace, timeout, || match child.try_wait() {
            Ok(Some(status)) => {
                let log = stderr.lock().map(|s| s.clone()).unwrap_or_default();
                Some(format!("process exited with {status}\n{log}"))
            }
            Ok(None) => None,
            Err(e) => Some(format!("cannot poll process: {e}")),
        })
        .await
    }

    /// Terminate the process and reap it.
    pub async fn shutdown(mut self) {
        if let Ok(Some(status)) = self.child.try_wait() {
            tracing::debug!(%status, "App server already exited");
            return;
        }
        tracing::info!("Shutting down app server");
        if let Err(e) = self.child.kill().await {
            tracing::warn!(error = %e, "Failed to kill app server");
        }
    }
}
