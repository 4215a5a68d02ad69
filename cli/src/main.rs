use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tickerscribe_core::audio;
use tickerscribe_core::batch::{BatchItem, BatchOrchestrator};
use tickerscribe_core::config::{Config, Device};
use tickerscribe_core::extract::{ExtractionMode, ExtractionRequest};
use tickerscribe_core::models::{ModelManager, WhisperModel};
use tickerscribe_core::pipeline::{PipelineOutcome, PipelineRunner};
use tickerscribe_core::registry::{ModelRegistry, ModelSpec};
use tickerscribe_core::repair;
use tickerscribe_core::transcribe::run_transcription;

/// Application-specific environment variable for log filtering (overrides config).
const LOG_ENV_VAR: &str = "TICKERSCRIBE_LOG";

#[derive(Parser)]
#[command(name = "tickerscribe")]
#[command(about = "Structured stock-index quotes from spoken market commentary")]
#[command(version)]
struct Cli {
    /// Alternate config file (default: ~/.config/tickerscribe/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a quote from one WAV file (mono, 16 kHz)
    Extract {
        audio: PathBuf,

        #[command(flatten)]
        opts: ExtractOpts,

        /// Print the full canonical record as JSON
        #[arg(long)]
        json: bool,

        /// Write the JSON record to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the repaired transcript and stop before extraction
        #[arg(long)]
        transcript_only: bool,
    },
    /// Process WAV files or directories of WAV files sequentially,
    /// reusing loaded models
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        opts: ExtractOpts,

        /// Write the JSON result map to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Manage transcription model artifacts
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },
}

#[derive(Args)]
struct ExtractOpts {
    /// Extraction mode: regex, llm or auto
    #[arg(long)]
    mode: Option<ExtractionMode>,

    /// Instruction prompt for llm mode (takes precedence over --prompt-file)
    #[arg(long)]
    prompt: Option<String>,

    /// File holding the instruction prompt
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Whisper model override
    #[arg(long)]
    model: Option<WhisperModel>,

    /// LLM model override for llm mode
    #[arg(long)]
    llm_model: Option<String>,

    /// Run whisper inference on the GPU
    #[arg(long)]
    gpu: bool,

    /// Per-file deadline in seconds
    #[arg(long)]
    timeout_secs: Option<f64>,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List known models and their cache status
    List,
    /// Download a model into the cache
    Download { model: WhisperModel },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };

    // TICKERSCRIBE_LOG env var overrides config file level
    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV_VAR)
        .with_default_directive(config.logging.level.as_directive().parse()?)
        .from_env()?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Route whisper.cpp and GGML logs through tracing
    whisper_rs::install_logging_hooks();

    tracing::debug!(config_file = ?cli.config, "Configuration loaded");

    match cli.command {
        Commands::Extract {
            audio,
            opts,
            json,
            output,
            transcript_only,
        } => extract(config, &audio, &opts, json, output.as_deref(), transcript_only).await,
        Commands::Batch {
            files,
            opts,
            output,
        } => batch(config, &files, &opts, output.as_deref()).await,
        Commands::Models { command } => models(command).await,
    }
}

/// Fold CLI overrides into the loaded config and build the per-run
/// extraction request.
fn resolve(mut config: Config, opts: &ExtractOpts) -> Result<(Config, ExtractionRequest)> {
    if let Some(model) = opts.model {
        config.model.transcription = model;
    }
    if opts.gpu {
        config.model.device = Device::Gpu;
    }

    let prompt = match (&opts.prompt, &opts.prompt_file, &config.extraction.prompt_file) {
        (Some(text), _, _) => Some(text.clone()),
        (None, Some(path), _) | (None, None, Some(path)) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?,
        ),
        (None, None, None) => None,
    };

    let request = ExtractionRequest {
        mode: opts.mode.unwrap_or(config.extraction.mode),
        prompt,
        model: opts.llm_model.clone(),
    };

    Ok((config, request))
}

fn deadline(opts: &ExtractOpts) -> Option<Duration> {
    opts.timeout_secs.map(Duration::from_secs_f64)
}

/// Expand directory arguments into the WAV files they contain, sorted
/// by name; plain file arguments pass through unchanged.
fn expand_inputs(args: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for arg in args {
        if arg.is_dir() {
            let mut found = Vec::new();
            for entry in std::fs::read_dir(arg)
                .with_context(|| format!("Failed to read directory: {}", arg.display()))?
            {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("wav")) {
                    found.push(path);
                }
            }
            if found.is_empty() {
                bail!("No .wav files found in {}", arg.display());
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(arg.clone());
        }
    }
    Ok(files)
}

async fn extract(
    config: Config,
    audio_path: &Path,
    opts: &ExtractOpts,
    json: bool,
    output: Option<&Path>,
    transcript_only: bool,
) -> Result<()> {
    let (config, request) = resolve(config, opts)?;
    let samples = audio::load_wav(audio_path)?;
    let registry = std::sync::Arc::new(ModelRegistry::from_config(&config)?);

    if transcript_only {
        let spec =
            ModelSpec::transcription(config.model.transcription.as_str(), config.model.device);
        let transcriber = registry.acquire_transcriber(&spec).await?;
        let transcript = run_transcription(transcriber, samples).await?;
        println!("{}", repair::clean_transcript(&transcript.text));
        return Ok(());
    }

    let runner = PipelineRunner::new(registry, config);
    let outcome = match deadline(opts) {
        Some(limit) => runner.run_with_timeout(samples, &request, limit).await,
        None => runner.run(samples, &request).await,
    };

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&outcome)?)
            .with_context(|| format!("Failed to write result to {}", path.display()))?;
        if outcome.error().is_some() {
            std::process::exit(1);
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        if outcome.error().is_some() {
            std::process::exit(1);
        }
        return Ok(());
    }

    match outcome {
        PipelineOutcome::Quote(quote) => {
            if quote.standardized_quote.is_empty() {
                println!("No index quote detected.");
            } else {
                println!("{}", quote.standardized_quote);
            }
            println!("transcript: {}", quote.full_transcription);
            if quote.low_confidence {
                println!("warning: extraction flagged low-confidence");
            }
            Ok(())
        }
        PipelineOutcome::Error(record) => {
            bail!("{} stage failed: {}", stage_name(&record), record.message)
        }
    }
}

fn stage_name(record: &tickerscribe_core::error::ErrorRecord) -> &'static str {
    use tickerscribe_core::error::Stage;
    match record.stage {
        Stage::Configuration => "configuration",
        Stage::Transcription => "transcription",
        Stage::Extraction => "extraction",
        Stage::Normalization => "normalization",
        Stage::Pipeline => "pipeline",
    }
}

async fn batch(
    config: Config,
    files: &[PathBuf],
    opts: &ExtractOpts,
    output: Option<&Path>,
) -> Result<()> {
    let (config, request) = resolve(config, opts)?;
    let files = expand_inputs(files)?;

    let mut items = Vec::with_capacity(files.len());
    let mut seen = std::collections::HashSet::new();
    for path in &files {
        let samples = audio::load_wav(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        // Fall back to the full path when two files share a stem
        let id = if seen.insert(stem.clone()) {
            stem
        } else {
            path.display().to_string()
        };
        items.push(BatchItem::new(id, samples));
    }

    let registry = std::sync::Arc::new(ModelRegistry::from_config(&config)?);
    let runner = PipelineRunner::new(registry, config);
    let mut orchestrator = BatchOrchestrator::new(runner);
    if let Some(limit) = deadline(opts) {
        orchestrator = orchestrator.with_item_deadline(limit);
    }

    let result = orchestrator.run(items, &request).await;
    let summary = result.summary();

    let rendered = serde_json::to_string_pretty(&result)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write results to {}", path.display()))?;
            println!(
                "{} of {} files succeeded, results written to {}",
                summary.succeeded,
                summary.total,
                path.display()
            );
        }
        None => {
            println!("{rendered}");
            eprintln!("{} of {} files succeeded", summary.succeeded, summary.total);
        }
    }

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn models(command: ModelsCommand) -> Result<()> {
    let manager = ModelManager::new()?;
    match command {
        ModelsCommand::List => {
            for model in WhisperModel::all() {
                let status = if manager.is_cached(*model) {
                    "cached"
                } else {
                    "not downloaded"
                };
                println!("{:<24} {}", model.as_str(), status);
            }
        }
        ModelsCommand::Download { model } => {
            let path = manager.ensure_model(model).await?;
            println!("{} available at {}", model, path.display());
        }
    }
    Ok(())
}
