use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use waav_edge_tts::core::tts::edge::messages::escape_xml;
use waav_edge_tts::utils::output;
use waav_edge_tts::{
    ClientConfig, EdgeTts, OutputFormat, SynthesisOptions, SynthesisOrchestrator,
    SynthesisRequest,
};

/// WaaV Edge TTS - Text to speech over the Edge read-aloud service
#[derive(Parser, Debug)]
#[command(name = "waav-edge-tts")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

/// Per-request overrides of the configured synthesis defaults
#[derive(Args, Debug, Clone, Default)]
struct VoiceArgs {
    /// Voice short name, e.g. en-US-AvaMultilingualNeural
    #[arg(short = 'v', long = "voice")]
    voice: Option<String>,

    /// Speaking rate delta, e.g. +10% or -20%
    #[arg(long = "rate", allow_hyphen_values = true)]
    rate: Option<String>,

    /// Volume delta, e.g. +10% or -20%
    #[arg(long = "volume", allow_hyphen_values = true)]
    volume: Option<String>,

    /// Pitch delta, e.g. +5Hz or -5Hz
    #[arg(long = "pitch", allow_hyphen_values = true)]
    pitch: Option<String>,

    /// Output format: mp3, webm, ogg, raw22050, raw44100
    #[arg(short = 'f', long = "format")]
    format: Option<OutputFormat>,
}

impl VoiceArgs {
    fn apply(self, mut options: SynthesisOptions) -> SynthesisOptions {
        if let Some(voice) = self.voice {
            options.voice = Some(voice);
        }
        if let Some(rate) = self.rate {
            options.rate = Some(rate);
        }
        if let Some(volume) = self.volume {
            options.volume = Some(volume);
        }
        if let Some(pitch) = self.pitch {
            options.pitch = Some(pitch);
        }
        if let Some(format) = self.format {
            options.output_format = format;
        }
        options
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize one text
    Speak {
        /// Text to speak (passed to SSML as-is)
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,

        /// Read the text from a file (XML-escaped before synthesis)
        #[arg(long = "file", value_name = "FILE")]
        file: Option<PathBuf>,

        #[command(flatten)]
        voice: VoiceArgs,

        /// Write audio to this file (stdout if omitted)
        #[arg(long = "write-media", value_name = "FILE")]
        write_media: Option<PathBuf>,

        /// Write word boundaries as JSON to this file
        #[arg(long = "write-metadata", value_name = "FILE")]
        write_metadata: Option<PathBuf>,
    },

    /// Synthesize several text files concurrently
    Batch {
        /// Input text files
        #[arg(required = true, value_name = "FILES")]
        files: Vec<PathBuf>,

        /// Maximum number of simultaneous sessions (defaults to the configured value)
        #[arg(short = 'j', long = "concurrency")]
        concurrency: Option<usize>,

        /// Directory for the audio and metadata files
        #[arg(short = 'o', long = "output-dir", default_value = ".")]
        output_dir: PathBuf,

        #[command(flatten)]
        voice: VoiceArgs,
    },

    /// List available voices
    Voices {
        /// Only show voices whose locale starts with this value, e.g. en or en-US
        #[arg(short = 'l', long = "locale")]
        locale: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing on stderr, stdout may carry audio
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        ClientConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ClientConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let tts = EdgeTts::new(config.connection_config())?;

    // Stop in-flight sessions on Ctrl+C
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling synthesis");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Speak {
            text,
            file,
            voice,
            write_media,
            write_metadata,
        } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => read_escaped(&path).await?,
                (None, None) => anyhow::bail!("Either TEXT or --file is required"),
            };

            let options = voice.apply(config.synthesis.clone());
            let request = SynthesisRequest::new(text, &options)?;
            let output = tts.synthesize(request, cancel).await?;

            if let Some(path) = write_media.as_deref() {
                output::write_audio(path, &output.audio).await?;
                info!("Audio written to {}", path.display());
            } else {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&output.audio).await?;
                stdout.flush().await?;
            }

            if let Some(path) = write_metadata.as_deref() {
                output::write_metadata(path, &output.word_boundaries).await?;
                info!("Metadata written to {}", path.display());
            }
        }

        Commands::Batch {
            files,
            concurrency,
            output_dir,
            voice,
        } => {
            let options = voice.apply(config.synthesis.clone());
            let mut requests = Vec::with_capacity(files.len());
            for path in &files {
                let text = read_escaped(path).await?;
                let request = SynthesisRequest::new(text, &options)
                    .with_context(|| format!("Invalid input {}", path.display()))?;
                requests.push(request);
            }

            let orchestrator = SynthesisOrchestrator::new(
                Arc::new(tts),
                concurrency.unwrap_or(config.max_concurrency),
            )?;
            let report = orchestrator.synthesize(requests, cancel).await;

            let mut failed = 0usize;
            for task in report.results {
                let input = &files[task.index];
                match task.result {
                    Ok(result) => {
                        let (media, metadata) = output::batch_output_paths(
                            &output_dir,
                            input,
                            task.index,
                            options.output_format,
                        );
                        output::save_output(&result, Some(media.as_path()), Some(metadata.as_path()))
                            .await?;
                        println!("{} -> {}", input.display(), media.display());
                    }
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {e}", input.display());
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{failed} of {} tasks failed", files.len());
            }
        }

        Commands::Voices { locale } => {
            let mut voices = tts.list_voices().await?;
            if let Some(locale) = locale.as_deref() {
                voices.retain(|v| v.matches_locale(locale));
            }
            voices.sort_by(|a, b| a.short_name.cmp(&b.short_name));

            println!("{:<40} {:<8} {:<10}", "Name", "Gender", "Locale");
            for voice in &voices {
                println!(
                    "{:<40} {:<8} {:<10}",
                    voice.short_name, voice.gender, voice.locale
                );
            }
        }
    }

    Ok(())
}

async fn read_escaped(path: &PathBuf) -> anyhow::Result<String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(escape_xml(&raw))
}
