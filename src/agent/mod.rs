//! Agent side of the process boundary.
//!
//! Selects a provider, probes the tool servers, asks the model for a summary
//! (with retries) and renders the transcript printed on stdout.

pub mod prompt;

use crate::config::Config;
use crate::extract::MARKER;
use crate::llm::LlmClient;
use crate::probe::checks::SystemCommands;
use crate::probe::{LiveTester, McpLiveTester, ServerProber, WorkingServer};
use crate::provider::{ProcessEnv, ProviderConfig, select_provider};
use anyhow::{Context, Result};
use prompt::Brief;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_TOPIC: &str = "artificial intelligence";

const RULE: &str = "==================================================";

/// Structured answer requested from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    #[serde(default)]
    pub image_path: String,
}

/// Everything the agent learned about its environment before researching.
pub struct Setup {
    pub provider: ProviderConfig,
    pub fallback_provider: bool,
    pub servers: Vec<WorkingServer>,
}

/// Run one research job end to end and return the printable transcript.
pub async fn run(config: &Config, topic: &str) -> Result<String> {
    let topic = normalize_topic(topic);
    info!(%topic, "agent starting");

    let selection = select_provider(&config.providers, &ProcessEnv, |p, key| {
        LlmClient::for_provider(p, key, config.llm.max_tokens)
    })?;
    let client = match selection.client {
        Some(client) => client,
        None => LlmClient::for_provider(
            &selection.provider,
            Some(selection.api_key.as_str()),
            config.llm.max_tokens,
        )
        .context("building fallback LLM client")?,
    };

    let prober = ServerProber::from_config(&config.servers, &SystemCommands);
    let tester = McpLiveTester;
    let live = config
        .servers
        .live_test
        .then_some(&tester as &dyn LiveTester);
    let servers = prober.probe(live).await;
    if servers.is_empty() {
        warn!("no MCP servers available, running in fallback mode");
    } else {
        info!(count = servers.len(), "using working MCP servers");
    }

    let setup = Setup {
        provider: selection.provider,
        fallback_provider: selection.fallback,
        servers,
    };
    let summary = research(&client, &setup, &topic, config.llm.max_retries).await?;
    Ok(render_transcript(&topic, &setup, &summary))
}

/// Blank input means the default topic.
pub fn normalize_topic(topic: &str) -> String {
    let topic = topic.trim();
    if topic.is_empty() {
        info!(default = DEFAULT_TOPIC, "no topic provided, using default");
        DEFAULT_TOPIC.into()
    } else {
        topic.into()
    }
}

/// Ask the model for a summary, retrying up to `max_retries` more times.
async fn research(
    client: &LlmClient,
    setup: &Setup,
    topic: &str,
    max_retries: u32,
) -> Result<Summary> {
    let brief = Brief::new(topic, &setup.servers);
    let system = brief.system_prompt();
    let user = brief.user_prompt();

    let attempts = max_retries + 1;
    let mut last_error = None;
    for attempt in 1..=attempts {
        info!(
            %topic,
            attempt,
            attempts,
            provider = ?client.provider(),
            model = client.model(),
            "starting research"
        );
        match client.complete_json::<Summary>(&system, &user).await {
            Ok(summary) if !summary.summary.trim().is_empty() => return Ok(summary),
            Ok(_) => {
                warn!(attempt, "model returned an empty summary");
                last_error = Some(anyhow::anyhow!("empty summary from model"));
            }
            Err(e) => {
                let msg: String = e.to_string().chars().take(100).collect();
                warn!(attempt, error = %msg, "research attempt failed");
                last_error = Some(e.into());
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow::anyhow!("no research attempts made"))
        .context(format!("all {attempts} attempts failed")))
}

/// Console transcript. The summary follows the `FINAL RESULT:` marker and
/// nothing is printed after it.
pub fn render_transcript(topic: &str, setup: &Setup, summary: &Summary) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "Using {}: {}{}",
        setup.provider.name,
        setup.provider.model,
        if setup.fallback_provider {
            " (fallback)"
        } else {
            ""
        }
    ));
    if setup.servers.is_empty() {
        out.push("No MCP servers available. Running in fallback mode.".into());
    } else {
        for server in &setup.servers {
            let tools: Vec<&str> = server.tools.iter().map(|t| t.name.as_str()).collect();
            out.push(format!("Server {}: [{}]", server.config.name, tools.join(", ")));
        }
    }
    out.push(format!("Starting research on: {topic}"));
    if !summary.image_path.trim().is_empty() {
        out.push(format!("Image created: {}", summary.image_path.trim()));
    }
    out.push(String::new());
    out.push(RULE.into());
    out.push(MARKER.into());
    out.push(summary.summary.trim().to_string());
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Strategy, extract_final_result};

    fn setup() -> Setup {
        Setup {
            provider: ProviderConfig::new("Ollama Local", "ollama/llama3.2", None, 0.7),
            fallback_provider: false,
            servers: Vec::new(),
        }
    }

    #[test]
    fn blank_topic_uses_default() {
        assert_eq!(normalize_topic("   \n"), DEFAULT_TOPIC);
        assert_eq!(normalize_topic(" tides \n"), "tides");
    }

    #[test]
    fn transcript_round_trips_through_extractor() {
        let summary = Summary {
            summary: "Photosynthesis turns light into sugar.\n\n- Chlorophyll absorbs light\n- The Calvin cycle fixes CO2".into(),
            image_path: String::new(),
        };
        let transcript = render_transcript("photosynthesis", &setup(), &summary);
        let result = extract_final_result(&transcript);
        assert_eq!(result.strategy, Strategy::Marker);
        assert_eq!(
            result.text,
            "Photosynthesis turns light into sugar.\n- Chlorophyll absorbs light\n- The Calvin cycle fixes CO2"
        );
    }

    #[test]
    fn transcript_mentions_fallback_mode_and_image() {
        let mut s = setup();
        s.fallback_provider = true;
        let summary = Summary {
            summary: "Body".into(),
            image_path: "servers/images/tides.jpeg".into(),
        };
        let transcript = render_transcript("tides", &s, &summary);
        assert!(transcript.contains("(fallback)"));
        assert!(transcript.contains("Running in fallback mode"));
        assert!(transcript.contains("Image created: servers/images/tides.jpeg"));
        assert!(transcript.ends_with("FINAL RESULT:\nBody"));
    }
}
