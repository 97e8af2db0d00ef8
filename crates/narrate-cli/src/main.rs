use anyhow::{bail, Context, Result};
use clap::{Args, Parser};
use narrate_core::{
    AudioFormat, FailurePolicy, HttpSpeechEngine, OutcomeStatus, Pipeline, PipelineConfig,
    SpeechEngine, SynthesisRequest, VoiceCatalog,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "narrate")]
#[command(version = narrate_core::VERSION)]
#[command(about = "Render long-form text or SSML to speech audio")]
struct Cli {
    #[command(flatten)]
    input: InputArgs,

    /// Output file; the extension selects WAV or MP3
    #[arg(short, long, default_value = "output.mp3")]
    output: PathBuf,

    /// Engine voice id
    #[arg(short, long, default_value = narrate_core::DEFAULT_VOICE)]
    voice: String,

    /// Playback-speed multiplier
    #[arg(short, long, default_value_t = 1.0)]
    speed: f32,

    /// Voice darkening, 1 (none) to 9
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=9))]
    depth: u8,

    /// Send the whole text in one engine call
    #[arg(long)]
    no_segment: bool,

    /// Fail instead of writing silence when synthesis fails
    #[arg(long)]
    strict: bool,

    /// Configuration file (defaults to narrate.toml in the config directory)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// List voices and exit
    #[arg(long)]
    list_voices: bool,

    /// With --list-voices, ask the speech service instead of the built-in list
    #[arg(long, requires = "list_voices")]
    remote: bool,

    /// Only list voices for this language or locale
    #[arg(long, requires = "list_voices")]
    language: Option<String>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
struct InputArgs {
    /// Text to read
    #[arg(short, long)]
    text: Option<String>,

    /// Script file; `.xml` and `.ssml` files are read as SSML
    #[arg(short, long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// SSML markup to read
    #[arg(long, value_name = "MARKUP")]
    ssml: Option<String>,
}

impl InputArgs {
    fn into_request(self) -> Result<SynthesisRequest> {
        if let Some(text) = self.text {
            return Ok(SynthesisRequest::text(text));
        }
        if let Some(markup) = self.ssml {
            return Ok(SynthesisRequest::ssml(markup));
        }
        if let Some(path) = self.file {
            return SynthesisRequest::from_script(&path)
                .with_context(|| format!("Failed to read script {}", path.display()));
        }
        bail!("Nothing to read: pass --text, --file or --ssml")
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = PipelineConfig::load(path)?;
            config.apply_env_overrides();
            config
        }
        None => PipelineConfig::load_default()?,
    };
    if cli.no_segment {
        config.segmentation = false;
    }
    if cli.strict {
        config.failure_policy = FailurePolicy::Propagate;
    }
    debug!("Effective configuration: {config:?}");
    Ok(config)
}

async fn list_voices(cli: &Cli, config: &PipelineConfig) -> Result<()> {
    let catalog = if cli.remote {
        let engine = HttpSpeechEngine::new(&config.engine)?;
        VoiceCatalog::from_engine_voices(engine.list_voices().await?)
    } else {
        VoiceCatalog::new()
    };
    let voices = match &cli.language {
        Some(language) => catalog.voices_by_language(language),
        None => catalog.voices(),
    };
    for voice in &voices {
        println!("{:<28} {:<32} {}", voice.id, voice.name, voice.language);
    }
    info!("{} voices", voices.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    let config = load_config(&cli)?;

    if cli.list_voices {
        return list_voices(&cli, &config).await;
    }

    let output_format = AudioFormat::from_path(&cli.output)?;
    Pipeline::ensure_ready_for(output_format)?;
    if !VoiceCatalog::new().contains(&cli.voice) {
        warn!("Voice {} is not in the built-in catalog; sending it anyway", cli.voice);
    }

    let engine = Arc::new(HttpSpeechEngine::new(&config.engine)?);
    let pipeline = Pipeline::new(config, engine)?;
    let output = cli.output.clone();
    let request = cli
        .input
        .into_request()?
        .with_voice(cli.voice)
        .with_speed(cli.speed)
        .with_depth(cli.depth);

    let outcome = pipeline.synthesize(&request, &output).await?;
    match &outcome.status {
        OutcomeStatus::Rendered => println!(
            "Wrote {} ({:.2}s, {} segments, {} skipped)",
            outcome.artifact.path.display(),
            outcome.artifact.duration.as_secs_f32(),
            outcome.segments_total,
            outcome.segments_failed()
        ),
        OutcomeStatus::Fallback { reason } => {
            warn!("Synthesis failed: {reason}");
            println!(
                "Wrote {:.2}s of silence to {} because synthesis failed",
                outcome.artifact.duration.as_secs_f32(),
                outcome.artifact.path.display()
            );
        }
    }
    Ok(())
}
