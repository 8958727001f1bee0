use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use redub::services::LanguageCode;
use redub::transcription::EngineKind;
use redub::{DubError, DubPipeline, DubRequest, RedubConfig};

/// Re-dub a video into another language, keeping the original timing.
#[derive(Parser, Debug)]
#[command(name = "redub", version, about)]
struct Args {
    /// Source video
    input: PathBuf,

    /// Target language code, e.g. es, hi, zh-CN
    #[arg(short, long = "lang")]
    lang: LanguageCode,

    /// Output path (default: translated_<input name> next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transcription engine, overrides the configuration
    #[arg(short, long)]
    engine: Option<EngineKind>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: tracing subscriber already installed");
    }

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e.downcast_ref::<DubError>().map(DubError::kind).unwrap_or("error");
            error!(kind, "{:#}", e);
            eprintln!("redub: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = RedubConfig::load(args.config.as_deref())?;
    if let Some(engine) = args.engine {
        config.transcription.engine = engine;
    }

    let output = match args.output {
        Some(path) => path,
        None => default_output(&args.input).context("input path has no file name")?,
    };
    let request = DubRequest {
        input: args.input,
        output,
        target_language: args.lang,
    };

    let pipeline = DubPipeline::from_config(&config)?;
    let report = match config.run_timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), pipeline.run(&request))
            .await
            .map_err(|_| DubError::Timeout(secs))??,
        None => pipeline.run(&request).await?,
    };

    info!(
        output = %report.video.path.display(),
        onset_seconds = report.onset_seconds,
        target_duration = report.target_duration,
        stretch = ?report.stretch,
        "Done"
    );
    println!("{}", report.video.path.display());
    Ok(())
}

fn default_output(input: &Path) -> Option<PathBuf> {
    let name = input.file_name()?.to_string_lossy();
    Some(input.with_file_name(format!("translated_{}", name)))
}
