//! Front-end pipeline for one topic: run the agent, recover its answer,
//! write the downloadable artifacts and remember the session.

use crate::config::Config;
use crate::error::Error;
use crate::extract::extract_final_result;
use crate::output::{WrittenOutputs, collect_images, write_outputs};
use crate::runner::AgentCommand;
use crate::session::{RunHistory, Session};
use anyhow::{Result, bail};
use chrono::Utc;
use std::time::Instant;
use tracing::{error, info, warn};

pub struct Outcome {
    pub session: Session,
    pub outputs: WrittenOutputs,
}

/// Provider banner printed by the agent, e.g. `Using Groq Llama: groq/...`.
pub fn provider_line(transcript: &str) -> Option<String> {
    transcript
        .lines()
        .find_map(|l| l.trim().strip_prefix("Using "))
        .map(|rest| rest.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub async fn run(config: &Config, topic: &str) -> Result<Outcome> {
    let topic = topic.trim();
    if topic.is_empty() {
        bail!("Please enter a research topic");
    }

    let command = AgentCommand::from_config(&config.runner)?;
    let mut history = RunHistory::new(topic);
    let started = Instant::now();
    info!(%topic, "research started");

    let result = command.run(topic).await;
    history.duration_secs = started.elapsed().as_secs_f64();

    let transcript = match result {
        Ok(t) => t,
        Err(e) => {
            match &e {
                Error::Timeout { secs } => warn!(%topic, secs, "research timed out"),
                other => error!(%topic, error = %other, "agent failed"),
            }
            history.timed_out = e.is_timeout();
            history.error = Some(e.to_string());
            record(&history, config);
            return Err(e.into());
        }
    };

    let extracted = extract_final_result(&transcript.stdout);
    let output_dir = &config.output.dir;
    std::fs::create_dir_all(output_dir)?;
    let images = collect_images(
        &config.output.images_dir,
        output_dir,
        config.output.max_images,
    );

    let session = Session {
        topic: topic.to_string(),
        result: extracted.display_text(),
        strategy: extracted.strategy,
        provider: provider_line(&transcript.stdout),
        images,
        completed_at: Utc::now(),
    };
    let outputs = write_outputs(output_dir, &session)?;
    session.save(output_dir)?;

    history.success = true;
    history.strategy = Some(session.strategy);
    history.image_count = session.images.len();
    record(&history, config);

    info!(
        %topic,
        strategy = %session.strategy,
        duration_secs = history.duration_secs,
        "research completed"
    );
    Ok(Outcome { session, outputs })
}

fn record(history: &RunHistory, config: &Config) {
    if let Err(e) = history.save(&config.output.dir) {
        warn!(error = %e, "could not save run history");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_provider_banner() {
        let transcript = "\x1b[1mstarting\x1b[0m\nUsing Groq Llama: groq/llama-3.3-70b-versatile\nFINAL RESULT:\nx";
        assert_eq!(
            provider_line(transcript).as_deref(),
            Some("Groq Llama: groq/llama-3.3-70b-versatile")
        );
        assert_eq!(provider_line("no banner here"), None);
    }

    #[tokio::test]
    async fn blank_topic_is_rejected_before_spawning() {
        let mut config = Config::default();
        config.runner.command = Some("definitely-not-a-real-program-7f3a".into());
        let err = run(&config, "   ").await.err().unwrap();
        assert!(err.to_string().contains("research topic"));
    }
}
