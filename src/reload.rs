// src/reload.rs

//! Config hot-reload support.
//!
//! Watches the resolved config file with the same polling primitive used
//! for stage directories. The caller re-parses on every change signal and
//! only tears the running graph down when the new config is valid.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Handle for the config-file watcher.
///
/// Each received `()` means the file was touched; bursts from a single save
/// should be drained before re-parsing.
pub struct ReloadWatcher {
    _watcher: PollWatcher,
    pub changes: mpsc::UnboundedReceiver<()>,
}

/// Watch the config file for modifications.
pub fn watch_config(path: &Path, poll_interval: Duration) -> Result<ReloadWatcher> {
    std::fs::metadata(path)
        .with_context(|| format!("config file {:?} is not readable", path))?;

    let (tx, changes) = mpsc::unbounded_channel::<()>();

    let config = Config::default().with_poll_interval(poll_interval);

    let mut watcher = PollWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if is_content_change(&event.kind) {
                    let _ = tx.send(());
                }
            }
        },
        config,
    )
    .context("creating config file watcher")?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching config file at {:?}", path))?;

    Ok(ReloadWatcher {
        _watcher: watcher,
        changes,
    })
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}
