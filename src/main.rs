use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loqa_copilot::{
    create_router, AcousticDiarizer, AnswerSink, AppState, AudioFile, Config, Copilot, HistoryAdapter,
    MemoryStore, NatsClient, NatsGenerator, NatsSearchAdapter, SearchAdapter, ShutdownMode,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "loqa-copilot", version, about = "Real-time interview copilot")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/copilot")]
    config: String,

    /// Override the NATS server URL
    #[arg(long)]
    nats_url: Option<String>,

    /// Override the number of answer workers
    #[arg(long)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the copilot service (default)
    Serve,
    /// Print acoustic speaker segments of a 16-bit PCM WAV file as JSON
    Diarize { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)?;
    if let Some(url) = cli.nats_url {
        cfg.nats.url = url;
    }
    if let Some(workers) = cli.workers {
        cfg.queue.workers = workers;
    }

    info!("Loqa Copilot v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cfg).await,
        Command::Diarize { path } => diarize(&cfg, &path),
    }
}

async fn serve(cfg: Config) -> Result<()> {
    let nats = Arc::new(NatsClient::connect(&cfg.nats.url, cfg.nats.answer_subject_prefix.clone()).await?);

    let mut adapters: Vec<Arc<dyn SearchAdapter>> = Vec::new();
    if let Some(corpus) = &cfg.generation.history_corpus {
        adapters.push(Arc::new(HistoryAdapter::from_file(corpus)?));
    }
    for (name, subject) in &cfg.nats.search_subjects {
        info!("Retrieval adapter {} on {}", name, subject);
        adapters.push(Arc::new(NatsSearchAdapter::new(name, subject, nats.client())));
    }

    let generator = Arc::new(NatsGenerator::new(&cfg.nats.generator_subject, nats.client()));
    let sinks: Vec<Arc<dyn AnswerSink>> = vec![nats.clone()];
    let copilot = Arc::new(Copilot::start(
        &cfg,
        Arc::new(MemoryStore::new()),
        adapters,
        generator,
        sinks,
    ));

    let ingest = nats
        .spawn_caption_ingest(&cfg.nats.caption_subject, Arc::clone(&copilot))
        .await?;

    let app = create_router(AppState::new(Arc::clone(&copilot)));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;

    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    ingest.abort();
    copilot.shutdown(ShutdownMode::Drain).await;

    Ok(())
}

fn diarize(cfg: &Config, path: &Path) -> Result<()> {
    let audio = AudioFile::open(path)?;
    let mut diarizer = AcousticDiarizer::new(cfg.diarization.clone());

    let segments = audio.identify_speakers(&mut diarizer);
    info!("Found {} speech segments", segments.len());

    println!("{}", serde_json::to_string_pretty(&segments)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
