use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crowe_workbench::{
    config::Config,
    create_router,
    datasets::load_dataset,
    models::{HypothesisModel, TestHypothesisRequest},
    utils::init_logger,
    AppState, HypothesisPipeline,
};

#[derive(Parser)]
#[command(name = "crowe-workbench", version, about = "Multi-agent hypothesis testing for the Crowe Logic workbench")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Test one hypothesis from the command line and print the result as JSON
    Test {
        /// JSON file holding the hypothesis
        #[arg(long)]
        hypothesis: PathBuf,
        /// Dataset files (.csv, .tsv, .json, .fasta)
        #[arg(long = "dataset")]
        datasets: Vec<PathBuf>,
        /// Free-form notes about the research session
        #[arg(long)]
        session_context: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Test {
            hypothesis,
            datasets,
            session_context,
        } => run_test(config, hypothesis, datasets, session_context).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Configuration loaded: {:?}", config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid HOST/PORT")?;

    let state = AppState::new(config);
    if let Err(reason) = &state.pipeline {
        warn!(%reason, "Hypothesis tests will return 503");
    }
    let app = create_router(state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn run_test(
    config: Config,
    hypothesis_path: PathBuf,
    dataset_paths: Vec<PathBuf>,
    session_context: Option<String>,
) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(&hypothesis_path)
        .await
        .with_context(|| format!("Failed to read {}", hypothesis_path.display()))?;
    let hypothesis: HypothesisModel =
        serde_json::from_str(&raw).context("Hypothesis file is not a valid hypothesis")?;

    let datasets = dataset_paths
        .iter()
        .map(|path| load_dataset(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let pipeline = HypothesisPipeline::from_config(&config.llm)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let request = TestHypothesisRequest {
        hypothesis,
        datasets,
        session_context,
    };
    let result = pipeline
        .test_hypothesis_with_progress(request, &cancel, |stage| info!(?stage, "Pipeline progress"))
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
