//! Environment diagnostics for the `doctor` command.

use crate::probe::checks::{CommandRunner, command_version, parse_major_version};
use crate::provider::CredentialSource;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Credential variables the agent and its tool servers may read.
pub const KNOWN_CREDENTIALS: &[&str] = &[
    "GROQ_API_KEY",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "BRAVE_API_KEY",
    "SEGMIND_API_KEY",
];

/// Show only the first and last four characters of a secret.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "***".into();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

#[derive(Debug, Clone)]
pub struct DoctorReport {
    pub node_version: Option<String>,
    pub node_compatible: bool,
    pub min_node_major: u32,
    pub npm_version: Option<String>,
    pub env_file: bool,
    /// Variable name and masked value, `None` when unset.
    pub credentials: Vec<(String, Option<String>)>,
}

fn npm_command() -> &'static str {
    if cfg!(windows) { "npm.cmd" } else { "npm" }
}

pub async fn diagnose(
    commands: &dyn CommandRunner,
    credentials: &dyn CredentialSource,
    env_file: &Path,
    min_node_major: u32,
    timeout: Duration,
) -> DoctorReport {
    let node_version = command_version(commands, "node", &["--version"], timeout).await;
    let node_compatible = node_version
        .as_deref()
        .and_then(parse_major_version)
        .is_some_and(|major| major >= min_node_major);
    let npm_version = command_version(commands, npm_command(), &["--version"], timeout).await;

    DoctorReport {
        node_version,
        node_compatible,
        min_node_major,
        npm_version,
        env_file: env_file.is_file(),
        credentials: KNOWN_CREDENTIALS
            .iter()
            .map(|var| (var.to_string(), credentials.get(var).map(|v| mask_secret(&v))))
            .collect(),
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node.js:")?;
        match &self.node_version {
            Some(v) if self.node_compatible => writeln!(f, "  [ok] {v}")?,
            Some(v) => writeln!(
                f,
                "  [!!] {v} is too old, the filesystem server needs v{}+",
                self.min_node_major
            )?,
            None => writeln!(f, "  [!!] not found")?,
        }
        writeln!(f, "npm:")?;
        match &self.npm_version {
            Some(v) => writeln!(f, "  [ok] {v}")?,
            None => writeln!(f, "  [!!] not found")?,
        }
        writeln!(f, ".env file:")?;
        writeln!(
            f,
            "  {}",
            if self.env_file { "[ok] found" } else { "[--] not found" }
        )?;
        writeln!(f, "Credentials:")?;
        for (name, value) in &self.credentials {
            match value {
                Some(masked) => writeln!(f, "  [ok] {name} = {masked}")?,
                None => writeln!(f, "  [--] {name} not set")?,
            }
        }
        Ok(())
    }
}
