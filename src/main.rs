use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "api")]
use yt_transcript_resolver::api::ApiServer;
use yt_transcript_resolver::blog::BlogGenerator;
use yt_transcript_resolver::config::Config;
use yt_transcript_resolver::resolver::TranscriptResolver;
use yt_transcript_resolver::transcript::TranscriptResult;
use yt_transcript_resolver::video_id::parse_video_id;

#[derive(Parser)]
#[command(name = "transcript-resolver")]
#[command(version, about = "Resolve YouTube transcripts through whichever channel still works")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: search the standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the transcript of a video
    Resolve {
        /// Video ID or URL
        input: String,
        /// Preferred transcript language
        #[arg(short, long)]
        language: Option<String>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Bypass the transcript cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Extract the video ID from a URL
    Parse { input: String },
    /// Run the HTTP API
    #[cfg(feature = "api")]
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Generate a blog post from a video's transcript
    Blog {
        /// Video ID or URL
        input: String,
        #[arg(short, long)]
        language: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Srt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "yt_transcript_resolver=debug,info"
    } else {
        "yt_transcript_resolver=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    config.validate()?;

    if cli.verbose {
        info!("{}", config.summary());
    }

    match cli.command {
        Commands::Parse { input } => {
            let video_id = parse_video_id(&input).ok_or_else(|| anyhow!("No video ID found in '{}'", input))?;
            println!("{}", video_id);
        }

        Commands::Resolve {
            input,
            language,
            format,
            no_cache,
        } => {
            let mut resolver = TranscriptResolver::from_config(&config)?;
            if no_cache {
                resolver = resolver.without_cache();
            }

            let result = resolve_until_interrupted(&resolver, &input, language.as_deref()).await?;
            print_result(&result, format)?;

            if !result.is_available() {
                std::process::exit(2);
            }
        }

        #[cfg(feature = "api")]
        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            ApiServer::from_config(std::sync::Arc::new(config))?.start().await?;
        }

        Commands::Blog { input, language } => {
            let generator = BlogGenerator::from_config(&config)?;
            let resolver = TranscriptResolver::from_config(&config)?;

            let result = resolve_until_interrupted(&resolver, &input, language.as_deref()).await?;
            match generator.generate(&result).await {
                Ok(post) => println!("{}", post.content),
                Err(e) => {
                    error!("❌ {}", e);
                    if let TranscriptResult::Unavailable { diagnostics, .. } = &result {
                        for (strategy, detail) in diagnostics {
                            error!("   {}: {}", strategy, detail);
                        }
                    }
                    std::process::exit(2);
                }
            }
        }
    }

    Ok(())
}

/// Resolve, cancelling cleanly on Ctrl-C
async fn resolve_until_interrupted(
    resolver: &TranscriptResolver,
    input: &str,
    language: Option<&str>,
) -> Result<TranscriptResult> {
    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let started = std::time::Instant::now();
    let outcome = resolver
        .resolve_with_cancel(input, language.unwrap_or_default(), &cancel)
        .await;
    ctrl_c.abort();

    let result = outcome?;
    info!("⏱️ Resolved {} in {:.2}s", result.video_id(), started.elapsed().as_secs_f64());
    Ok(result)
}

fn print_result(result: &TranscriptResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => match result {
            TranscriptResult::Available { .. } => println!("{}", result.plain_text()),
            TranscriptResult::Unavailable { reason, diagnostics, .. } => {
                eprintln!("{}", reason);
                for (strategy, detail) in diagnostics {
                    eprintln!("  {}: {}", strategy, detail);
                }
            }
        },
        OutputFormat::Srt => print!("{}", result.to_srt()),
    }
    Ok(())
}
