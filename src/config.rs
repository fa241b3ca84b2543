use crate::error::{Error, Result};
use crate::provider::ProviderConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub servers: ServersConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Extra completion attempts after the first one fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
        }
    }
}

/// Where the auxiliary tool servers live and how hard to probe them.
#[derive(Debug, Deserialize)]
pub struct ServersConfig {
    #[serde(default = "default_servers_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_python")]
    pub python: String,
    /// Root directory exposed by the filesystem server. Defaults to `~/Downloads`.
    #[serde(default)]
    pub filesystem_root: Option<PathBuf>,
    #[serde(default = "default_min_node_major")]
    pub min_node_major: u32,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_live_timeout")]
    pub live_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub live_test: bool,
}

impl Default for ServersConfig {
    fn default() -> Self {
        Self {
            dir: default_servers_dir(),
            python: default_python(),
            filesystem_root: None,
            min_node_major: default_min_node_major(),
            probe_timeout_secs: default_probe_timeout(),
            live_timeout_secs: default_live_timeout(),
            live_test: true,
        }
    }
}

impl ServersConfig {
    pub fn filesystem_root(&self) -> PathBuf {
        self.filesystem_root.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join("Downloads")
        })
    }
}

/// How the front end launches the agent process.
#[derive(Debug, Deserialize)]
pub struct RunnerConfig {
    /// Program to run. `None` means this executable.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_runner_args")]
    pub args: Vec<String>,
    #[serde(default = "default_runner_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: default_runner_args(),
            timeout_secs: default_runner_timeout(),
            working_dir: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
    #[serde(default = "default_max_images")]
    pub max_images: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            images_dir: default_images_dir(),
            max_images: default_max_images(),
        }
    }
}

// Defaults
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new(
            "Groq Llama",
            "groq/llama-3.3-70b-versatile",
            Some("GROQ_API_KEY"),
            0.7,
        ),
        ProviderConfig::new("OpenAI GPT-4", "gpt-4o-mini", Some("OPENAI_API_KEY"), 0.7),
        ProviderConfig::new(
            "Anthropic Claude",
            "claude-3-haiku-20240307",
            Some("ANTHROPIC_API_KEY"),
            0.7,
        ),
        ProviderConfig::new("Ollama Local", "ollama/llama3.2", None, 0.7),
    ]
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_max_retries() -> u32 {
    2
}
fn default_servers_dir() -> PathBuf {
    PathBuf::from("servers")
}
fn default_python() -> String {
    "python".into()
}
fn default_min_node_major() -> u32 {
    18
}
fn default_probe_timeout() -> u64 {
    10
}
fn default_live_timeout() -> u64 {
    90
}
fn default_true() -> bool {
    true
}
fn default_runner_args() -> Vec<String> {
    vec!["agent".into()]
}
fn default_runner_timeout() -> u64 {
    300
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_images_dir() -> PathBuf {
    PathBuf::from("servers/images")
}
fn default_max_images() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            providers: default_providers(),
            servers: ServersConfig::default(),
            runner: RunnerConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| Error::config(format!("Failed to parse config: {e}")))
    }

    /// Load the config file if it exists; a missing file means all defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(Error::config("at least one [[providers]] entry is required"));
        }
        if self.runner.timeout_secs == 0 {
            return Err(Error::config("runner.timeout_secs must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let toml = r#"
[llm]
max_tokens = 2048
max_retries = 1

[[providers]]
name = "Local"
model = "ollama/qwen3"
temperature = 0.2

[[providers]]
name = "OpenAI"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
temperature = 0.7

[servers]
dir = "tools"
python = "python3"
filesystem_root = "/tmp/share"
min_node_major = 20
live_test = false

[runner]
command = "python"
args = ["main.py"]
timeout_secs = 60

[output]
dir = "out"
max_images = 3
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.providers.len(), 2);
        assert!(config.providers[0].api_key_env.is_none());
        assert_eq!(config.servers.dir, PathBuf::from("tools"));
        assert_eq!(config.servers.min_node_major, 20);
        assert_eq!(config.servers.probe_timeout_secs, 10);
        assert!(!config.servers.live_test);
        assert_eq!(
            config.servers.filesystem_root(),
            PathBuf::from("/tmp/share")
        );
        assert_eq!(config.runner.command.as_deref(), Some("python"));
        assert_eq!(config.runner.timeout_secs, 60);
        assert_eq!(config.output.max_images, 3);
        assert_eq!(config.output.images_dir, PathBuf::from("servers/images"));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.providers.len(), 4);
        assert_eq!(config.providers[0].name, "Groq Llama");
        assert!(config.providers[3].api_key_env.is_none());
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.servers.min_node_major, 18);
        assert_eq!(config.servers.live_timeout_secs, 90);
        assert_eq!(config.runner.timeout_secs, 300);
        assert_eq!(config.runner.args, vec!["agent".to_string()]);
        assert_eq!(config.output.max_images, 1);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.providers.len(), 4);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[runner\ntimeout_secs = ").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }

    #[test]
    fn output_section_ignores_search_cache_key() {
        let toml = r#"
[output]
dir = "out"
search_results_dir = "servers/search_results"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert_eq!(config.output.images_dir, PathBuf::from("servers/images"));
    }

    #[test]
    fn validate_rejects_empty_provider_list() {
        let mut config = Config::default();
        config.providers.clear();
        assert!(config.validate().is_err());
    }
}
