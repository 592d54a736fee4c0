use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use voxdetect::classifier::{Classifier, WeightSource};
use voxdetect::config::DetectorConfig;
use voxdetect::pipeline::{DetectionRequest, FaultClass, Pipeline};
use voxdetect::weights::WeightStore;

const EXIT_SERVER_FAULT: u8 = 1;
const EXIT_CLIENT_FAULT: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "voxdetect")]
#[command(about = "Classify speech audio as AI-generated or human", long_about = None)]
struct Args {
    /// Path to an audio file (WAV, MP3, FLAC, OGG, AAC).
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Read base64-encoded audio from stdin.
    #[arg(long, default_value_t = false)]
    stdin: bool,

    /// Trained classifier weights (safetensors).
    #[arg(long, env = "VOXDETECT_MODEL_PATH")]
    model: Option<PathBuf>,

    /// Detector config JSON; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// MFCC coefficients to extract.
    #[arg(long)]
    n_mfcc: Option<usize>,

    /// Language tag echoed in the response.
    #[arg(long)]
    language: Option<String>,

    /// Truncate decoded audio to this many seconds (0 disables the cap).
    #[arg(long)]
    max_duration: Option<f32>,

    /// Load the weights artifact and report its contents without classifying.
    #[arg(long, default_value_t = false)]
    inspect_model: bool,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    if args.inspect_model {
        inspect_model(&config.model_path)?;
        return Ok(ExitCode::SUCCESS);
    }

    let modes = u32::from(args.audio.is_some()) + u32::from(args.stdin);
    if modes != 1 {
        anyhow::bail!("choose exactly one input mode: --audio or --stdin");
    }

    let audio_base64 = match &args.audio {
        Some(path) => {
            let bytes = std::fs::read(path).with_context(|| format!("read file {path:?}"))?;
            STANDARD.encode(bytes)
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            buf
        }
    };

    let classifier = Arc::new(Classifier::load(&config.model_path));
    let pipeline = Pipeline::new(&config, classifier);

    let mut request = DetectionRequest::new(audio_base64).with_coefficient_count(config.n_mfcc);
    request.language = args.language.clone();

    match pipeline.detect(&request) {
        Ok(response) => {
            let json = serde_json::to_string_pretty(&response).context("serialize response")?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let fault = err.fault();
            let body = serde_json::json!({
                "error": err.to_string(),
                "fault": match fault {
                    FaultClass::Client => "client",
                    FaultClass::Server => "server",
                },
            });
            println!("{body}");
            tracing::error!(error = %err, ?fault, "detection failed");
            Ok(ExitCode::from(match fault {
                FaultClass::Client => EXIT_CLIENT_FAULT,
                FaultClass::Server => EXIT_SERVER_FAULT,
            }))
        }
    }
}

fn build_config(args: &Args) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_path(path).context("load detector config")?,
        None => DetectorConfig::default(),
    };
    if let Some(path) = &args.model {
        config.model_path.clone_from(path);
    }
    if let Some(n) = args.n_mfcc {
        config.n_mfcc = n;
    }
    if let Some(secs) = args.max_duration {
        config.max_duration_secs = (secs > 0.0).then_some(secs);
    }
    config.validate().context("invalid detector config")?;
    Ok(config)
}

fn inspect_model(path: &Path) -> Result<()> {
    let classifier = Classifier::load(path);
    match classifier.weight_source() {
        WeightSource::Trained { path, epoch, loss } => {
            let store = WeightStore::open(path).context("reopen weights")?;
            let names = store.names().context("list tensor names")?;
            eprintln!(
                "weights ok: path={} tensor_count={} epoch={} loss={}",
                path.display(),
                names.len(),
                epoch.map_or_else(|| "-".to_string(), |e| e.to_string()),
                loss.map_or_else(|| "-".to_string(), |l| format!("{l:.6}")),
            );
        }
        WeightSource::Default { reason } => {
            eprintln!("degraded mode: default parameters in use ({reason})");
        }
    }
    Ok(())
}
