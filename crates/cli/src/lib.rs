use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docchat_rag::{
    Document, EmbeddingMode, GeneratorKind, Generation, IngestStats, RagConfig, RagEngine,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use walkdir::WalkDir;

mod chat;
mod frontend;

pub use chat::run_chat;
pub use frontend::{
    ingest_status, render_error, render_generation, ChatFrontend, Turn, MSG_NO_CORPUS,
    MSG_NO_DOCUMENTS, MSG_NO_RELEVANT,
};

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "docchat")]
#[command(about = "Chat with your documents: a persistent vector store plus retrieval", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (default: ./docchat.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store directory (overrides DOCCHAT_STORE_DIR)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Override embedding backend in this process
    #[arg(long, global = true, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Model directory (overrides DOCCHAT_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Answer generator backend
    #[arg(long, global = true, value_enum)]
    generator: Option<GeneratorBackend>,

    /// Base URL of an OpenAI-compatible server
    #[arg(long, global = true)]
    generator_url: Option<String>,

    /// Model name sent to the generator server
    #[arg(long, global = true)]
    generator_model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents (files, or directories walked recursively)
    Ingest(IngestArgs),

    /// Ask one question against the ingested documents
    Ask(AskArgs),

    /// List ingested documents
    List,

    /// Interactive chat with conversation history
    Chat,

    /// Show store statistics
    Stats(StatsArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Files or directories to ingest
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Args)]
struct AskArgs {
    /// The question
    question: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Print the retrieved chunks after the answer
    #[arg(long)]
    sources: bool,
}

#[derive(Args)]
struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedMode {
    Stub,
    Onnx,
}

impl From<EmbedMode> for EmbeddingMode {
    fn from(mode: EmbedMode) -> Self {
        match mode {
            EmbedMode::Stub => Self::Stub,
            EmbedMode::Onnx => Self::Onnx,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GeneratorBackend {
    Extractive,
    Openai,
}

impl From<GeneratorBackend> for GeneratorKind {
    fn from(backend: GeneratorBackend) -> Self {
        match backend {
            GeneratorBackend::Extractive => Self::Extractive,
            GeneratorBackend::Openai => Self::OpenaiCompatible,
        }
    }
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // ORT logs every session option at info level
    if !cli.verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = resolve_config(&cli)?;
    let frontend = ChatFrontend::new(RagEngine::from_config(config)?);

    match cli.command {
        Commands::Ingest(args) => run_ingest(&frontend, args, cli.quiet).await?,
        Commands::Ask(args) => run_ask(&frontend, args).await?,
        Commands::List => print_stdout(&frontend.list_ingested_documents().await)?,
        Commands::Chat => {
            run_chat(
                &frontend,
                tokio::io::BufReader::new(tokio::io::stdin()),
                io::stdout(),
            )
            .await?;
        }
        Commands::Stats(args) => run_stats(&frontend, args).await?,
    }

    Ok(())
}

/// Config file and environment first, then command-line flags on top
fn resolve_config(cli: &Cli) -> Result<RagConfig> {
    let mut config = RagConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(dir) = &cli.store_dir {
        config.store.dir = dir.clone();
    }
    if let Some(mode) = cli.embed_mode {
        config.embedding.mode = mode.into();
    }
    if let Some(dir) = &cli.model_dir {
        config.embedding.model_dir = dir.clone();
    }
    if let Some(backend) = cli.generator {
        config.generator.kind = backend.into();
    }
    if let Some(url) = &cli.generator_url {
        config.generator.base_url = url.clone();
    }
    if let Some(model) = &cli.generator_model {
        config.generator.model = model.clone();
    }
    Ok(config)
}

async fn run_ingest(frontend: &ChatFrontend, args: IngestArgs, quiet: bool) -> Result<()> {
    let files = collect_inputs(&args.paths);
    if files.is_empty() {
        anyhow::bail!("No supported documents found (expected .pdf, .txt, .md)");
    }

    let progress = if quiet || files.len() == 1 {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {wide_msg}")
                .context("Invalid progress template")?,
        );
        bar
    };

    let mut stats = IngestStats::new();
    let started = std::time::Instant::now();
    for file in &files {
        progress.set_message(file.display().to_string());
        let result = frontend.engine().ingest_path(file).await;
        let status = ingest_status(&result);
        progress.suspend(|| print_stdout(&status))?;
        match result {
            Ok(report) => stats.add_report(&report),
            Err(err) => stats.add_error(file.display().to_string(), err.to_string()),
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    stats.time_ms = elapsed_ms(started);

    log::info!(
        "Ingested {} documents ({} chunks) in {} ms",
        stats.documents,
        stats.chunks,
        stats.time_ms
    );
    if !stats.errors.is_empty() {
        anyhow::bail!(
            "{} of {} documents failed to ingest",
            stats.errors.len(),
            files.len()
        );
    }
    Ok(())
}

fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Expand directories into their supported files; explicit file arguments are kept as given
fn collect_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).sort_by_file_name() {
            match entry {
                Ok(entry) if entry.file_type().is_file() && Document::is_supported(entry.path()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }
    }
    files
}

async fn run_ask(frontend: &ChatFrontend, args: AskArgs) -> Result<()> {
    let answer = match frontend.engine().ask(&args.question, args.top_k).await {
        Ok(answer) => answer,
        Err(err) => anyhow::bail!(render_error(&err)),
    };

    print_stdout(&render_generation(&answer.generation))?;
    if args.sources {
        for (rank, source) in answer.sources.iter().enumerate() {
            let page = source
                .chunk
                .page
                .map_or_else(String::new, |p| format!(" p.{p}"));
            print_stdout(&format!(
                "[{}] {}{} (distance {:.4})",
                rank + 1,
                source.chunk.origin_document,
                page,
                source.distance
            ))?;
        }
    }
    if let Generation::Failed(_) = answer.generation {
        anyhow::bail!("Answer generation failed");
    }
    Ok(())
}

async fn run_stats(frontend: &ChatFrontend, args: StatsArgs) -> Result<()> {
    let stats = frontend.engine().stats().await?;
    if args.json {
        print_stdout(&serde_json::to_string_pretty(&stats)?)?;
    } else {
        print_stdout(&stats.to_string())?;
    }
    Ok(())
}
