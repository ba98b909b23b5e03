use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use yt_transcript_resolver::cache::FileCache;
use yt_transcript_resolver::config::Config;
use yt_transcript_resolver::video_id::parse_video_id;

#[derive(Parser)]
#[command(name = "cache-manager")]
#[command(about = "Transcript cache management utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Cache directory (defaults to the configured one)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all cached transcripts
    List,
    /// Get cache statistics
    Stats,
    /// Invalidate cached results for a video
    Invalidate {
        /// Video ID or URL
        video: String,
        /// Only drop this language (default: all languages)
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Clear all cache entries
    Clear,
    /// Clean up expired cache entries
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let cli = Cli::parse();

    let cache_dir = match cli.cache_dir {
        Some(dir) => dir,
        None => Config::load()?.cache.dir,
    };
    let cache = FileCache::new(cache_dir);
    cache.initialize().await?;

    match cli.command {
        Commands::List => {
            let entries = cache.list().await?;

            if entries.is_empty() {
                info!("📭 No cached transcripts found");
                return Ok(());
            }

            info!("📚 Found {} cached results:", entries.len());

            for entry in entries {
                let status = if entry.is_valid { "✅ Valid" } else { "❌ Expired" };
                let content = if entry.available {
                    format!("{} segments", entry.segment_count)
                } else {
                    "unavailable".to_string()
                };
                info!(
                    "  {} [{}] - {}, {} hours old, {}",
                    entry.video_id, entry.language, content, entry.age_hours, status
                );
            }
        }

        Commands::Stats => {
            let stats = cache.stats().await?;
            info!("📊 Cache Statistics:");
            info!("  Directory: {}", cache.cache_dir().display());
            info!("  Total files: {}", stats.total_files);
            info!("  Valid files: {}", stats.valid_files);
            info!("  Expired files: {}", stats.expired_files);
            info!("  Transcripts: {}", stats.available_transcripts);
            info!("  Unavailable results: {}", stats.unavailable_results);
            info!("  Total segments: {}", stats.total_segments);
        }

        Commands::Invalidate { video, language } => {
            let video_id = parse_video_id(&video).ok_or_else(|| anyhow!("No video ID found in '{}'", video))?;
            let removed = cache.invalidate(&video_id, language.as_deref()).await?;
            if removed > 0 {
                info!("✅ Invalidated {} cache entries for: {}", removed, video_id);
            } else {
                warn!("⚠️ No cache entries found for: {}", video_id);
            }
        }

        Commands::Clear => {
            let count = cache.clear().await?;
            info!("🧹 Cleared {} cache files", count);
        }

        Commands::Cleanup => {
            let count = cache.cleanup_expired().await?;
            info!("🗑️ Cleaned up {} expired cache files", count);
        }
    }

    Ok(())
}
