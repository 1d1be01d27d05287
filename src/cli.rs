use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::CollisionPolicy;

#[derive(Parser, Debug, Default)]
#[command(name = "spectab", about = "Extract spectral summary statistics from audio files into a CSV table")]
pub struct Cli {
    /// Root directory scanned recursively for audio files
    pub root: Option<PathBuf>,

    /// Output CSV file [default: features.csv]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Allowed file extensions, comma-separated [default: mp3]
    #[arg(short, long, value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Seconds of audio read from each file [default: 30]
    #[arg(long)]
    pub max_duration: Option<f64>,

    /// Parallel extraction workers [default: 1]
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Handling of files sharing the same base name [default: warn]
    #[arg(long, value_enum)]
    pub collisions: Option<CollisionPolicy>,

    /// Write the run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Config file (TOML). Defaults to ./spectab.toml or the user config dir
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}
