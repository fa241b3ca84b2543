//! Launches the agent process for one topic and buffers its transcript.

use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Full captured output of one agent run.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct AgentCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl AgentCommand {
    /// Resolve the configured command; with none set, re-invoke this executable.
    pub fn from_config(config: &RunnerConfig) -> Result<Self> {
        let program = match &config.command {
            Some(cmd) => PathBuf::from(cmd),
            None => std::env::current_exe()?,
        };
        Ok(Self {
            program,
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Run to completion: topic on stdin, everything else buffered.
    ///
    /// Exceeding the timeout kills the child and returns [`Error::Timeout`];
    /// a nonzero exit returns [`Error::Process`] with stderr verbatim.
    pub async fn run(&self, topic: &str) -> Result<Transcript> {
        info!(program = %self.program.display(), args = ?self.args, "starting agent");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        let mut child = command.spawn()?;

        // stdin is fed concurrently with output collection, under the same deadline.
        let stdin = child.stdin.take();
        let line = format!("{topic}\n");
        let feed = async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    // The agent may exit without reading; its exit status tells the story.
                    warn!(error = %e, "could not write topic to agent stdin");
                }
            }
        };
        let exchange = async move {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        let output = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(secs = self.timeout.as_secs(), "agent timed out, killed");
                return Err(Error::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let transcript = Transcript {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            stdout_bytes = transcript.stdout.len(),
            stderr_bytes = transcript.stderr.len(),
            "agent finished"
        );

        if output.status.success() {
            Ok(transcript)
        } else {
            Err(Error::Process {
                code: output.status.code().unwrap_or(-1),
                stderr: transcript.stderr,
            })
        }
    }
}
