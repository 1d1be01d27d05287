use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::discover::normalize_extensions;
use crate::pipeline::{CollisionPolicy, RunConfig};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    pub root: Option<PathBuf>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_max_duration")]
    pub max_duration: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub collisions: CollisionPolicy,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingConfig {
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            root: None,
            extensions: default_extensions(),
            max_duration: default_max_duration(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            collisions: CollisionPolicy::default(),
            report: None,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { jobs: default_jobs() }
    }
}

fn default_extensions() -> Vec<String> { vec!["mp3".into()] }
fn default_max_duration() -> f64 { 30.0 }
fn default_output_path() -> PathBuf { "features.csv".into() }
fn default_jobs() -> usize { 1 }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// `./spectab.toml`, then `<config dir>/spectab/config.toml`.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("spectab.toml");
    if local.exists() {
        return Some(local);
    }
    let platform = dirs::config_dir()?.join("spectab").join("config.toml");
    platform.exists().then_some(platform)
}

/// Fully resolved settings for one invocation.
#[derive(Debug)]
pub struct Settings {
    pub run: RunConfig,
    pub report: Option<PathBuf>,
}

/// Merge CLI flags over file values over defaults, then validate.
pub fn resolve(cli: Cli, file: Config) -> Result<Settings> {
    let root = cli
        .root
        .or(file.input.root)
        .context("No input directory given (pass ROOT or set input.root in the config)")?;

    let raw_extensions = if cli.extensions.is_empty() {
        file.input.extensions
    } else {
        cli.extensions
    };
    let extensions = normalize_extensions(raw_extensions);
    if extensions.is_empty() {
        bail!("Extension list is empty");
    }

    let max_duration_secs = cli.max_duration.unwrap_or(file.input.max_duration);
    if !max_duration_secs.is_finite() || max_duration_secs <= 0.0 {
        bail!("max duration must be a positive number of seconds, got {max_duration_secs}");
    }

    let jobs = cli.jobs.unwrap_or(file.processing.jobs);
    if jobs == 0 {
        bail!("jobs must be at least 1");
    }

    Ok(Settings {
        run: RunConfig {
            root,
            output: cli.output.unwrap_or(file.output.path),
            extensions,
            max_duration_secs,
            jobs,
            collisions: cli.collisions.unwrap_or(file.output.collisions),
            progress: !cli.no_progress,
            cancel: Default::default(),
        },
        report: cli.report.or(file.output.report),
    })
}
