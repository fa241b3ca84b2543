//! Cheap, side-effect-free availability checks.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs short external commands with a bound on how long they may take.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput>;
}

/// Real subprocesses via tokio.
pub struct SystemCommands;

#[async_trait]
impl CommandRunner for SystemCommands {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout {
                secs: timeout.as_secs(),
            })??;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// The package runner executable for this platform.
pub fn npx_command() -> &'static str {
    if cfg!(windows) { "npx.cmd" } else { "npx" }
}

pub fn file_exists(label: &str, path: &Path) -> bool {
    if path.is_file() {
        info!(server = label, path = %path.display(), "server file found");
        true
    } else {
        warn!(server = label, path = %path.display(), "server file not found");
        false
    }
}

/// Run `program args` and return its trimmed stdout when it exits 0.
pub async fn command_version(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Option<String> {
    match runner.run(program, args, timeout).await {
        Ok(out) if out.success => {
            info!(program, version = %out.stdout, "command available");
            Some(out.stdout)
        }
        Ok(out) => {
            warn!(program, stderr = %out.stderr, "command check failed");
            None
        }
        Err(e) => {
            warn!(program, error = %e, "command not available");
            None
        }
    }
}

/// Major component of a version string like `v18.19.0` or `20.1`.
pub fn parse_major_version(version: &str) -> Option<u32> {
    version
        .trim()
        .trim_start_matches('v')
        .split('.')
        .next()?
        .parse()
        .ok()
}

/// Whether `node --version` reports at least `min_major`.
pub async fn node_version_at_least(
    runner: &dyn CommandRunner,
    min_major: u32,
    timeout: Duration,
) -> bool {
    let Some(version) = command_version(runner, "node", &["--version"], timeout).await else {
        return false;
    };
    match parse_major_version(&version) {
        Some(major) if major >= min_major => {
            info!(%version, "Node.js version is compatible");
            true
        }
        Some(_) => {
            warn!(%version, min_major, "Node.js version too old");
            false
        }
        None => {
            warn!(%version, "cannot parse Node.js version");
            false
        }
    }
}
