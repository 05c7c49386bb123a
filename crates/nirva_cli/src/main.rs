use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use nirva_analysis::DailyAnalysis;
use nirva_analysis::config::ProviderConfig;
use nirva_analysis::http_client::AnthropicAnalyzer;
use nirva_cli::{Pipeline, PipelineConfig, store};

#[derive(Parser, Debug)]
#[command(name = "nirva", version, about = "Daily transcript analysis pipeline")]
struct Cli {
    /// Write Prometheus metrics to this file when the command finishes.
    #[arg(long, env = "NIRVA_METRICS_FILE", global = true)]
    metrics_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Extract every transcript day, then parse every stored reply (default).
    Run,
    /// Send each transcript day to the model and store the raw reply.
    Extract,
    /// Recover documents from stored replies, all of them unless files are given.
    Parse {
        /// Raw reply files named `raw_response_YYYY-MM-DD.txt`.
        files: Vec<PathBuf>,
    },
    /// Print the JSON schema of the output document.
    Schema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configure logging from env var `NIRVA_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("NIRVA_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let combined_filter = format!("{log_env},hyper=warn,reqwest=warn");
    let env_filter = tracing_subscriber::EnvFilter::try_new(combined_filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hyper=warn,reqwest=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::debug!("nirva: log filter: {}", log_env);

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);

    if command == Command::Schema {
        let schema = schemars::schema_for!(DailyAnalysis);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let metrics = match cli.metrics_file {
        Some(path) => Some((path, install_metrics()?)),
        None => None,
    };

    let config = PipelineConfig::from_env().context("pipeline configuration")?;
    let pipeline = Pipeline::new(config);

    let report = match &command {
        Command::Parse { files } if !files.is_empty() => {
            let files: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
            pipeline.parse_files(&files).await?
        }
        Command::Parse { .. } => pipeline.parse().await?,
        Command::Extract => pipeline.extract(&anthropic()?).await?,
        Command::Run | Command::Schema => pipeline.run(&anthropic()?).await?,
    };
    tracing::info!(%report, "nirva: {command:?} finished");

    if let Some((path, handle)) = metrics {
        store::write_atomic(&path, handle.render().as_bytes()).await?;
        tracing::debug!(path = %path.display(), "nirva: metrics written");
    }
    Ok(())
}

fn anthropic() -> anyhow::Result<AnthropicAnalyzer> {
    let provider = ProviderConfig::from_env().context("provider configuration")?;
    let analyzer = AnthropicAnalyzer::new(&provider)?;
    tracing::info!(model = %provider.model, "nirva: provider ready");
    Ok(analyzer)
}

fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing metrics recorder")?;
    Ok(handle)
}
