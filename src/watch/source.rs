// src/watch/source.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use notify::{Config, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::graph::stage::Stage;
use crate::watch::filter::PatternFilter;

/// Normalized filesystem event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
    Removed,
}

/// A filtered, normalized filesystem event for one stage.
#[derive(Debug, Clone)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
}

/// Watch handle for one stage.
///
/// Owns the underlying poll watcher; dropping this stops file watching.
/// The stage's pattern filter runs inside the watcher callback, so only
/// accepted basenames ever reach the event channel. Watcher errors flow on
/// their own channel and are non-fatal.
pub struct WatchSource {
    _watcher: PollWatcher,
    pub events: mpsc::UnboundedReceiver<FsEvent>,
    pub errors: mpsc::UnboundedReceiver<notify::Error>,
}

impl std::fmt::Debug for WatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSource").finish()
    }
}

/// Register a poll watcher on the stage's root directory.
///
/// Fails if the root cannot be watched; the caller treats that as fatal for
/// this stage only.
pub fn attach(stage: &Stage, poll_interval: Duration) -> Result<WatchSource> {
    let metadata = std::fs::metadata(&stage.dir)
        .with_context(|| format!("stage directory {:?} is not readable", stage.dir))?;
    ensure!(
        metadata.is_dir(),
        "stage watch root {:?} is not a directory",
        stage.dir
    );

    let filter = PatternFilter::new(stage.files.clone());
    let (event_tx, events) = mpsc::unbounded_channel::<FsEvent>();
    let (error_tx, errors) = mpsc::unbounded_channel::<notify::Error>();

    let config = Config::default().with_poll_interval(poll_interval);

    // Called synchronously on the watcher's poll thread.
    let mut watcher = PollWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some(kind) = normalize_kind(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    let accepted = path
                        .file_name()
                        .map(|name| filter.accepts(&name.to_string_lossy()))
                        .unwrap_or(false);
                    if accepted {
                        let _ = event_tx.send(FsEvent { path, kind });
                    }
                }
            }
            Err(err) => {
                let _ = error_tx.send(err);
            }
        },
        config,
    )
    .context("creating filesystem watcher")?;

    let mode = if stage.recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };

    watcher
        .watch(&stage.dir, mode)
        .with_context(|| format!("watching directory {:?} for stage '{}'", stage.dir, stage.name))?;

    Ok(WatchSource {
        _watcher: watcher,
        events,
        errors,
    })
}

fn normalize_kind(kind: &EventKind) -> Option<FsEventKind> {
    match kind {
        EventKind::Create(_) => Some(FsEventKind::Created),
        EventKind::Modify(_) => Some(FsEventKind::Modified),
        EventKind::Remove(_) => Some(FsEventKind::Removed),
        _ => None,
    }
}
