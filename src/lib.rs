// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod reload;
pub mod watch;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::loader;
use crate::config::validate::validate_config;
use crate::engine::orchestrator;
use crate::graph::stage::{EdgeMode, StageGraph};
use crate::reload::ReloadWatcher;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config discovery, loading and validation
/// - logging
/// - the stage graph orchestrator
/// - config hot-reload
/// - OS signal handling
pub async fn run(args: CliArgs) -> Result<()> {
    let dirname = loader::resolve_dirname(args.dirname.as_deref());
    let (mut raw, config_path) = loader::load(&dirname)?;

    logging::init_logging(args.log_level, raw.loglevel.as_deref())?;

    validate_config(&mut raw)?;
    let mut graph = StageGraph::from_raw(&raw);

    if args.dry_run {
        print!("{}", render_dry_run(&graph));
        return Ok(());
    }

    let poll_interval = Duration::from_millis(args.poll_ms.max(1));

    // Reload is best-effort: if the config file cannot be watched we keep
    // running with the boot-time graph.
    let mut reloads = match reload::watch_config(&config_path, poll_interval) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            warn!(error = %err, "config hot-reload disabled");
            None
        }
    };

    loop {
        let handle = orchestrator::boot(&graph, poll_interval);
        info!(stages = handle.stage_count(), config = ?config_path, "stage graph started");

        // The running graph is only torn down for shutdown or a reload that
        // parsed and validated; an invalid config leaves it untouched.
        let next = loop {
            tokio::select! {
                res = shutdown_requested() => {
                    info!("shutdown signal received");
                    handle.shutdown().await;
                    res?;
                    return Ok(());
                }
                _ = next_reload(&mut reloads) => {
                    match reparse(&config_path) {
                        Ok(next) => break next,
                        Err(err) => {
                            error!(error = %err, "ignoring invalid config; keeping current stage graph");
                        }
                    }
                }
            }
        };

        info!("config changed; restarting stage graph");
        handle.shutdown().await;
        graph = next;
    }
}

/// Wait for the next config change signal, draining any burst.
///
/// Pends forever when hot-reload is disabled or the watcher died, so the
/// select in [`run`] only ever completes via the shutdown path.
async fn next_reload(watcher: &mut Option<ReloadWatcher>) {
    match watcher {
        Some(w) => match w.changes.recv().await {
            Some(()) => {
                while w.changes.try_recv().is_ok() {}
            }
            None => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}

/// Re-parse and validate the config file after a change.
fn reparse(config_path: &Path) -> Result<StageGraph> {
    let mut raw = loader::load_from_path(config_path)?;
    validate_config(&mut raw)?;
    Ok(StageGraph::from_raw(&raw))
}

/// Completes once the operator asks the process to stop.
///
/// Ctrl-C covers the interactive case on every platform (and SIGINT with
/// it); Unix service managers stop us with SIGTERM or SIGQUIT instead, so
/// those unwind the graph the same way.
#[cfg(unix)]
async fn shutdown_requested() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
        _ = quit.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_requested() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Render the resolved stages as shown by `--dry-run`.
pub fn render_dry_run(graph: &StageGraph) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let _ = writeln!(out, "multiwatch dry-run");
    let _ = writeln!(out, "stages ({}):", graph.len());

    for stage in graph.stages() {
        let _ = writeln!(out, "  - {}", stage.name);
        let _ = writeln!(
            out,
            "      dir: {:?} (recursive: {})",
            stage.dir, stage.recursive
        );
        let _ = writeln!(out, "      cmd: {:?}", stage.cmd);
        let _ = writeln!(
            out,
            "      early-terminate: {}, start: {}",
            stage.early_terminate, stage.start
        );
        if !stage.dependencies.is_empty() {
            let deps: Vec<String> = stage
                .dependencies
                .iter()
                .map(|dep| match dep.mode {
                    EdgeMode::Sync => dep.stage.clone(),
                    EdgeMode::Async => format!("{} (async)", dep.stage),
                })
                .collect();
            let _ = writeln!(out, "      depends: {}", deps.join(", "));
        }
        let files: Vec<String> = stage
            .files
            .iter()
            .map(|pattern| {
                if pattern.exclude {
                    format!("!{}", pattern.source())
                } else {
                    pattern.source().to_string()
                }
            })
            .collect();
        let _ = writeln!(out, "      files: {}", files.join(", "));
    }

    out
}
