use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tracing::{info, warn};

/// Result of one rebuild attempt, serialized as-is by `/api/rebuild`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    pub ok: bool,
    pub skipped: bool,
    pub error: Option<String>,
    pub code: Option<i32>,
    pub signal: Option<String>,
}

impl BuildOutcome {
    fn skipped() -> Self {
        Self { ok: true, skipped: true, ..Default::default() }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Default::default() }
    }

    fn from_status(status: ExitStatus) -> Self {
        Self {
            ok: status.success(),
            code: status.code(),
            signal: exit_signal(status),
            ..Default::default()
        }
    }

    /// Short human-readable reason for a failed build.
    pub fn describe(&self) -> String {
        if let Some(err) = &self.error {
            return format!("build failed: {err}");
        }
        match (self.code, &self.signal) {
            (Some(code), _) => format!("build failed with exit code {code}"),
            (None, Some(sig)) => format!("build killed by {sig}"),
            (None, None) => "build failed".to_string(),
        }
    }
}

/// Runs the external site build command.
#[derive(Debug, Clone)]
pub struct Builder {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
    timeout: Duration,
    skip: bool,
}

impl Builder {
    /// `command` is split on whitespace; the first word is the program.
    pub fn new(command: &str, cwd: PathBuf, timeout: Duration, skip: bool) -> Self {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next().unwrap_or_default();
        Self { program, args: words.collect(), cwd, timeout, skip }
    }

    pub async fn trigger(&self) -> BuildOutcome {
        if self.skip {
            info!("SKIP_BUILD set, skipping build");
            return BuildOutcome::skipped();
        }
        if self.program.is_empty() {
            return BuildOutcome::failed("no build command configured");
        }

        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.program, error = %e, "could not start build");
                return BuildOutcome::failed(format!("spawn {}: {e}", self.program));
            }
        };

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let outcome = BuildOutcome::from_status(status);
                if outcome.ok {
                    info!(program = %self.program, "build finished");
                } else {
                    warn!(code = ?outcome.code, signal = ?outcome.signal, "build failed");
                }
                outcome
            }
            Ok(Err(e)) => BuildOutcome::failed(format!("wait for build: {e}")),
            Err(_) => {
                let _ = child.kill().await;
                warn!(timeout_secs = self.timeout.as_secs(), "build timed out");
                BuildOutcome::failed(format!("timed out after {}s", self.timeout.as_secs()))
            }
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    use nix::sys::signal::Signal;
    status.signal().map(|sig| match Signal::try_from(sig) {
        Ok(named) => named.as_str().to_string(),
        Err(_) => format!("signal {sig}"),
    })
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<String> {
    None
}
