use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use omniresearch_core::{
    ConfigLoader, Mode, ResearchEngine, RunRequest, StepEvent, run_research_session,
    stream_research_session,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "omniresearch-cli",
    version,
    about = "Iterative research pipeline runner"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a research session for a topic.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Topic to research.
    #[arg(long)]
    topic: String,

    /// Depth mode: "shallow" or "deep".
    #[arg(long, default_value = "shallow")]
    mode: String,

    /// Print step events as JSON lines while the run advances, instead of
    /// only the final report.
    #[arg(long)]
    stream: bool,

    /// Optional configuration file (defaults to ./omniresearch.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,omniresearch_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn run_command(args: RunArgs) -> Result<()> {
    let config = ConfigLoader::load_or_default(args.config)?;

    let mode: Mode = args.mode.parse()?;
    let request = RunRequest::new(&args.topic, mode);
    request.validate()?;

    let engine = ResearchEngine::from_config(&config)?;
    info!(topic = %args.topic, %mode, "starting research session");

    if args.stream {
        let mut receiver = stream_research_session(Arc::new(engine), request);
        let mut aborted = false;
        while let Some(event) = receiver.recv().await {
            if matches!(event, StepEvent::Error { .. }) {
                aborted = true;
            }
            println!("{}", serde_json::to_string(&event)?);
        }
        if aborted {
            bail!("research run aborted; see the terminal error event above");
        }
        return Ok(());
    }

    let outcome = run_research_session(&engine, request).await?;

    println!("{}", outcome.final_report);
    if !outcome.validated_sources.is_empty() {
        println!("\nSources:");
        for (idx, source) in outcome.validated_sources.iter().enumerate() {
            println!("  {}. {}", idx + 1, source);
        }
    }
    Ok(())
}
