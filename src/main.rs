use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use topic_scout::config::Config;
use topic_scout::probe::checks::SystemCommands;
use topic_scout::probe::{LiveTester, McpLiveTester, ServerProber};
use topic_scout::provider::ProcessEnv;
use topic_scout::session::Session;
use topic_scout::{agent, doctor, extract, output, research};

#[derive(Parser)]
#[command(
    name = "topic-scout",
    version,
    about = "Research a topic with an LLM agent and MCP tool servers, then distill its answer"
)]
struct Cli {
    /// Path to config file (missing file means defaults)
    #[arg(short, long, global = true, default_value = "topic-scout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Research a topic: run the agent, extract its answer, write the report
    Run {
        /// Topic to research
        topic: String,
    },

    /// Agent process: reads one topic line on stdin, prints the transcript
    Agent,

    /// Probe the declared MCP servers and print the working set as JSON
    Probe {
        /// Skip the live connect/list-tools round trip
        #[arg(long)]
        no_live: bool,
    },

    /// Extract the final answer from a saved transcript (stdin when no file)
    Extract {
        file: Option<PathBuf>,
    },

    /// Show the last completed research session
    Show,

    /// Check Node.js, npm, .env and credential variables
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the agent transcript, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("topic_scout=info")),
        )
        .init();

    dotenvy::from_path("../.env").ok();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    config.validate()?;

    match cli.command {
        Command::Run { topic } => {
            let outcome = research::run(&config, &topic).await?;
            println!("{}", outcome.session.result);
            println!();
            println!("Saved: {}", outcome.outputs.text.display());
            println!("Report: {}", outcome.outputs.report.display());
            print_images(&outcome.session);
            Ok(())
        }
        Command::Agent => {
            let mut line = String::new();
            tokio::io::BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .context("reading topic from stdin")?;
            let transcript = agent::run(&config, &line).await?;
            println!("{transcript}");
            Ok(())
        }
        Command::Probe { no_live } => {
            let prober = ServerProber::from_config(&config.servers, &SystemCommands);
            let tester = McpLiveTester;
            let live = (!no_live && config.servers.live_test)
                .then_some(&tester as &dyn LiveTester);
            let working = prober.probe(live).await;
            println!("{}", serde_json::to_string_pretty(&working)?);
            Ok(())
        }
        Command::Extract { file } => {
            let transcript = read_transcript(file.as_deref())?;
            let result = extract::extract_final_result(&transcript);
            eprintln!("Strategy: {}", result.strategy);
            println!("{}", result.display_text());
            Ok(())
        }
        Command::Show => {
            let session = Session::load(&config.output.dir)?;
            let written = output::write_outputs(&config.output.dir, &session)?;
            println!(
                "{} ({})",
                session.topic,
                session.completed_at.format("%Y-%m-%d %H:%M UTC")
            );
            println!();
            println!("{}", session.result);
            println!();
            println!("Report: {}", written.report.display());
            print_images(&session);
            Ok(())
        }
        Command::Doctor => {
            let report = doctor::diagnose(
                &SystemCommands,
                &ProcessEnv,
                Path::new(".env"),
                config.servers.min_node_major,
                Duration::from_secs(config.servers.probe_timeout_secs),
            )
            .await;
            print!("{report}");
            Ok(())
        }
    }
}

fn read_transcript(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading transcript {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn print_images(session: &Session) {
    if session.images.is_empty() {
        println!("No images generated.");
    }
    for img in &session.images {
        match &img.error {
            Some(err) => println!("Image {}: {err}", img.file_name),
            None => println!("Image: {} ({} bytes)", img.file_name, img.size),
        }
    }
}
