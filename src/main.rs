mod audio;
mod cli;
mod config;
mod discover;
mod error;
mod pipeline;
mod table;
#[cfg(test)]
mod testutil;

use anyhow::{Context, Result};
use clap::Parser;

use audio::analysis::StftAnalyzer;
use cli::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // An explicit --config must load; an auto-detected one is best effort
    let file_config = match cli.config.clone() {
        Some(path) => {
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => match config::find_config() {
            Some(path) => match config::load_config(&path) {
                Ok(cfg) => {
                    log::info!("Loaded config from {}", path.display());
                    cfg
                }
                Err(err) => {
                    log::warn!("Ignoring config {}: {:#}", path.display(), err);
                    config::Config::default()
                }
            },
            None => config::Config::default(),
        },
    };

    let settings = config::resolve(cli, file_config)?;
    let run = &settings.run;

    log::info!("spectab - spectral feature tabulator");
    log::info!("Input: {}", run.root.display());
    log::info!("Output: {}", run.output.display());
    log::info!(
        "Extensions: {}, max duration {}s, {} job(s)",
        run.extensions.join(","),
        run.max_duration_secs,
        run.jobs
    );

    // Ctrl-C stops after the current batch; rows already written stay whole
    let cancel = run.cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        cancel.store(true, std::sync::atomic::Ordering::SeqCst);
    }) {
        log::warn!("Could not install Ctrl-C handler: {}", err);
    }

    let analyzer = StftAnalyzer::default();
    let report = pipeline::run(run, &analyzer)
        .context("Run aborted before completion")?;

    report.log_summary();

    println!(
        "{} discovered, {} processed, {} failed",
        report.discovered,
        report.succeeded,
        report.failed()
    );
    for failure in &report.failures {
        println!("  {}: {}", failure.path.display(), failure.reason);
    }

    if let Some(ref path) = settings.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        log::info!("Report written to {}", path.display());
    }

    Ok(())
}
