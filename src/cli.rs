use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vodforge")]
#[command(author, version, about = "Adaptive-bitrate HLS transcoding for uploaded video")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcode a file into HLS next to it (or under --output)
    Run {
        /// Input file to transcode
        #[arg(required = true)]
        input: PathBuf,

        /// Output root (defaults to the input's directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of ladder rungs for large inputs
        #[arg(long)]
        max_rungs: Option<usize>,

        /// Size threshold in MB between single and multi-rendition output
        #[arg(long)]
        threshold_mb: Option<u64>,

        /// Kill the encoder after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Probe a media file and display resolution and audio presence
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the ladder that would be planned for a source resolution
    Plan {
        /// Source width in pixels
        #[arg(long)]
        width: u32,

        /// Source height in pixels
        #[arg(long)]
        height: u32,

        /// Number of ladder rungs
        #[arg(long)]
        max_rungs: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config or defaults if not specified)
        config: Option<PathBuf>,
    },
}
