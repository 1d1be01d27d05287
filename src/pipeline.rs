use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::analysis::SpectralAnalyzer;
use crate::audio::features::{extract_features, FeatureRecord, FeatureSet, FIELDNAMES};
use crate::discover::discover;
use crate::error::{ExtractError, RunError};
use crate::table::TableWriter;

/// What to do when two discovered files share a base name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Keep base names, log and report the collision.
    #[default]
    Warn,
    /// Abort before writing anything.
    Fail,
    /// Use the path relative to the root as the filename column.
    RelativePath,
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub root: PathBuf,
    pub output: PathBuf,
    pub extensions: Vec<String>,
    pub max_duration_secs: f64,
    pub jobs: usize,
    pub collisions: CollisionPolicy,
    pub progress: bool,
    /// Checked between batches; once set, no further rows are written.
    pub cancel: Arc<AtomicBool>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NameCollision {
    pub filename: String,
    pub paths: Vec<PathBuf>,
}

/// Outcome of a completed run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub output: PathBuf,
    pub discovered: usize,
    pub succeeded: usize,
    pub failures: Vec<FileFailure>,
    /// Base names shared by several rows of the table. Always empty under
    /// [`CollisionPolicy::RelativePath`], whose rows are unique.
    pub collisions: Vec<NameCollision>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn log_summary(&self) {
        log::info!(
            "{} discovered, {} processed, {} failed",
            self.discovered,
            self.succeeded,
            self.failed()
        );
        if !self.collisions.is_empty() {
            log::warn!("{} base names are shared by several files", self.collisions.len());
        }
    }
}

/// Discover, extract and tabulate every matching file under `config.root`.
///
/// Per-file failures are recorded in the report; discovery, collision (with
/// [`CollisionPolicy::Fail`]) and sink errors abort the run.
pub fn run(config: &RunConfig, analyzer: &dyn SpectralAnalyzer) -> Result<RunReport, RunError> {
    let files = discover(&config.root, &config.extensions)?;

    let collisions = match config.collisions {
        CollisionPolicy::RelativePath => Vec::new(),
        CollisionPolicy::Warn | CollisionPolicy::Fail => find_collisions(&files),
    };
    if let (CollisionPolicy::Fail, Some(first)) = (config.collisions, collisions.first()) {
        return Err(RunError::FilenameCollision {
            filename: first.filename.clone(),
            paths: first.paths.clone(),
        });
    }
    for c in &collisions {
        log::warn!("{} files share the name {}", c.paths.len(), c.filename);
    }

    let mut table = TableWriter::create(&config.output)?;
    table.write_header(&FIELDNAMES)?;
    log::info!("Writing features to {}", config.output.display());

    let pool = if config.jobs > 1 {
        Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.jobs)
                .build()?,
        )
    } else {
        None
    };
    let batch_size = if pool.is_some() { config.jobs * 2 } else { 1 };

    let pb = progress_bar(files.len() as u64, config.progress);
    let mut succeeded = 0;
    let mut failures = Vec::new();

    // a panic in a decoder or analyzer fails that file only
    let extract = |path: &PathBuf| -> Result<FeatureSet, ExtractError> {
        catch_unwind(AssertUnwindSafe(|| {
            extract_features(path, config.max_duration_secs, analyzer)
        }))
        .unwrap_or_else(|payload| {
            Err(ExtractError::Panicked {
                path: path.clone(),
                message: panic_message(payload.as_ref()),
            })
        })
    };

    for batch in files.chunks(batch_size) {
        if config.cancel.load(Ordering::SeqCst) {
            let written = table.finish()?;
            pb.abandon();
            log::warn!("Cancelled after {} of {} files", written + failures.len(), files.len());
            return Err(RunError::Cancelled { written });
        }

        let results: Vec<Result<FeatureSet, ExtractError>> = match &pool {
            Some(pool) => pool.install(|| batch.par_iter().map(extract).collect()),
            None => batch.iter().map(extract).collect(),
        };

        // results are in discovery order regardless of which worker finished first
        for (path, result) in batch.iter().zip(results) {
            match result {
                Ok(fields) => {
                    let record = FeatureRecord {
                        filename: row_name(&config.root, path, config.collisions),
                        fields,
                    };
                    table.write_record(&record)?;
                    succeeded += 1;
                    log::debug!("Processed {}", path.display());
                }
                Err(e) => {
                    log::warn!("{}", e);
                    failures.push(FileFailure {
                        path: path.clone(),
                        reason: e.reason(),
                    });
                }
            }
            pb.inc(1);
        }
    }

    table.finish()?;
    pb.finish_and_clear();

    Ok(RunReport {
        root: config.root.clone(),
        output: config.output.clone(),
        discovered: files.len(),
        succeeded,
        failures,
        collisions,
    })
}

/// Base names shared by more than one file, in name order.
fn find_collisions(files: &[PathBuf]) -> Vec<NameCollision> {
    let mut by_name: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        by_name.entry(base_name(path)).or_default().push(path.clone());
    }
    by_name
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(filename, paths)| NameCollision { filename, paths })
        .collect()
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn row_name(root: &Path, path: &Path, policy: CollisionPolicy) -> String {
    match policy {
        CollisionPolicy::RelativePath => match path.strip_prefix(root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => base_name(path),
        },
        CollisionPolicy::Warn | CollisionPolicy::Fail => base_name(path),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
