//! Tool-server discovery: static availability checks followed by a live
//! MCP round trip against every server that passed.

pub mod checks;

use crate::config::ServersConfig;
use crate::error::{Error, Result};
use crate::mcp::{McpClient, ToolInfo};
use async_trait::async_trait;
use checks::{CommandRunner, command_version, file_exists, node_version_at_least, npx_command};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// How to launch one tool server as a stdio subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Overrides layered on top of the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// A server that passed probing, with the tools it advertised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingServer {
    pub config: ServerConfig,
    pub tools: Vec<ToolInfo>,
}

/// An optional auxiliary capability the agent may use.
#[async_trait]
pub trait ToolServer: Send + Sync {
    fn name(&self) -> &str;

    /// Static check. Must not start the server.
    async fn is_available(&self, commands: &dyn CommandRunner, timeout: Duration) -> bool;

    fn launch_config(&self) -> ServerConfig;
}

/// A server implemented as a script file run by an interpreter.
pub struct ScriptServer {
    pub name: String,
    pub interpreter: String,
    pub script: PathBuf,
    pub env: BTreeMap<String, String>,
}

#[async_trait]
impl ToolServer for ScriptServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self, _commands: &dyn CommandRunner, _timeout: Duration) -> bool {
        file_exists(&self.name, &self.script)
    }

    fn launch_config(&self) -> ServerConfig {
        let script = std::path::absolute(&self.script).unwrap_or_else(|_| self.script.clone());
        ServerConfig {
            name: self.name.clone(),
            command: self.interpreter.clone(),
            args: vec![script.to_string_lossy().into_owned()],
            env: self.env.clone(),
        }
    }
}

/// A server fetched and run through `npx`, optionally gated on the Node.js version.
pub struct NpxServer {
    pub name: String,
    pub package: String,
    pub args: Vec<String>,
    pub min_node_major: Option<u32>,
}

#[async_trait]
impl ToolServer for NpxServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self, commands: &dyn CommandRunner, timeout: Duration) -> bool {
        if command_version(commands, npx_command(), &["--version"], timeout)
            .await
            .is_none()
        {
            warn!(server = %self.name, "skipping: npx not available");
            return false;
        }
        if let Some(min) = self.min_node_major {
            if !node_version_at_least(commands, min, timeout).await {
                warn!(
                    server = %self.name,
                    min_node_major = min,
                    "skipping: Node.js version incompatible, update to v{min}+"
                );
                return false;
            }
        }
        true
    }

    fn launch_config(&self) -> ServerConfig {
        let mut args = vec!["-y".to_string(), self.package.clone()];
        args.extend(self.args.iter().cloned());
        ServerConfig {
            name: self.name.clone(),
            command: npx_command().into(),
            args,
            env: BTreeMap::new(),
        }
    }
}

/// The servers this application knows about, in priority order:
/// image generation, web search, filesystem access.
pub fn declared_servers(config: &ServersConfig) -> Vec<Box<dyn ToolServer>> {
    let python_env = BTreeMap::from([("UV_PYTHON".to_string(), "3.12".to_string())]);
    vec![
        Box::new(ScriptServer {
            name: "Image Server".into(),
            interpreter: config.python.clone(),
            script: config.dir.join("image_server.py"),
            env: python_env.clone(),
        }),
        Box::new(ScriptServer {
            name: "Python Search Server".into(),
            interpreter: config.python.clone(),
            script: config.dir.join("search_server.py"),
            env: python_env,
        }),
        Box::new(NpxServer {
            name: "Filesystem Server".into(),
            package: "@modelcontextprotocol/server-filesystem".into(),
            args: vec![config.filesystem_root().to_string_lossy().into_owned()],
            min_node_major: Some(config.min_node_major),
        }),
    ]
}

/// Connects to a server and lists its tools.
#[async_trait]
pub trait LiveTester: Send + Sync {
    async fn list_tools(&self, server: &ServerConfig) -> Result<Vec<ToolInfo>>;
}

pub struct McpLiveTester;

#[async_trait]
impl LiveTester for McpLiveTester {
    async fn list_tools(&self, server: &ServerConfig) -> Result<Vec<ToolInfo>> {
        let mut client = McpClient::connect(server).await?;
        let tools = client.list_tools().await;
        client.shutdown().await;
        tools
    }
}

pub struct ServerProber<'a> {
    servers: Vec<Box<dyn ToolServer>>,
    commands: &'a dyn CommandRunner,
    probe_timeout: Duration,
    live_timeout: Duration,
}

impl<'a> ServerProber<'a> {
    pub fn new(
        servers: Vec<Box<dyn ToolServer>>,
        commands: &'a dyn CommandRunner,
        probe_timeout: Duration,
        live_timeout: Duration,
    ) -> Self {
        Self {
            servers,
            commands,
            probe_timeout,
            live_timeout,
        }
    }

    pub fn from_config(config: &ServersConfig, commands: &'a dyn CommandRunner) -> Self {
        Self::new(
            declared_servers(config),
            commands,
            Duration::from_secs(config.probe_timeout_secs),
            Duration::from_secs(config.live_timeout_secs),
        )
    }

    /// Static checks for every declared server, in declaration order.
    pub async fn probe_static(&self) -> Vec<ServerConfig> {
        info!(declared = self.servers.len(), "diagnosing MCP servers");
        let mut available = Vec::new();
        for server in &self.servers {
            if server.is_available(self.commands, self.probe_timeout).await {
                info!(server = server.name(), "server configured");
                available.push(server.launch_config());
            } else {
                warn!(server = server.name(), "server skipped");
            }
        }
        info!(count = available.len(), "server configurations found");
        available
    }

    /// Connect to each server; keep the ones that answer `tools/list` in time.
    pub async fn smoke_test(
        &self,
        configs: Vec<ServerConfig>,
        tester: &dyn LiveTester,
    ) -> Vec<WorkingServer> {
        let mut working = Vec::new();
        for config in configs {
            info!(server = %config.name, timeout_secs = self.live_timeout.as_secs(), "testing server");
            let outcome = tokio::time::timeout(self.live_timeout, tester.list_tools(&config))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Timeout {
                        secs: self.live_timeout.as_secs(),
                    })
                });
            match outcome {
                Ok(tools) => {
                    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                    info!(server = %config.name, tools = ?names, "server connected");
                    working.push(WorkingServer { config, tools });
                }
                Err(e) => {
                    let msg: String = e.to_string().chars().take(100).collect();
                    warn!(server = %config.name, error = %msg, "server failed live test");
                }
            }
        }
        working
    }

    /// Static probing, then the live test when a tester is given.
    pub async fn probe(&self, tester: Option<&dyn LiveTester>) -> Vec<WorkingServer> {
        let configs = self.probe_static().await;
        match tester {
            Some(tester) => self.smoke_test(configs, tester).await,
            None => configs
                .into_iter()
                .map(|config| WorkingServer {
                    config,
                    tools: Vec::new(),
                })
                .collect(),
        }
    }
}
