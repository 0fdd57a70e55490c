// src/engine/orchestrator.rs

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::runner::StageRunner;
use crate::graph::stage::StageGraph;
use crate::graph::wiring::wire_stages;
use crate::watch;

/// Handle to a running stage graph.
pub struct GraphHandle {
    shutdown: CancellationToken,
    runners: Vec<JoinHandle<()>>,
}

/// Build the wiring for every stage and launch one runner per stage.
///
/// A stage whose directory cannot be watched is disabled (its runner never
/// starts); the rest of the graph still runs. Each runner owns its watch
/// handle, child slot, and subscriber lists; the only shared object is the
/// cancellation token used as the closed signal.
pub fn boot(graph: &StageGraph, poll_interval: Duration) -> GraphHandle {
    let shutdown = CancellationToken::new();
    let mut runners = Vec::with_capacity(graph.len());

    for wiring in wire_stages(graph) {
        let stage = wiring.stage.clone();

        match watch::source::attach(&stage, poll_interval) {
            Ok(source) => {
                info!(
                    stage = %stage.name,
                    dir = ?stage.dir,
                    recursive = stage.recursive,
                    "watching"
                );
                let runner = StageRunner::new(wiring, source, shutdown.child_token());
                runners.push(tokio::spawn(runner.run()));
            }
            Err(err) => {
                error!(
                    stage = %stage.name,
                    error = %err,
                    "cannot watch stage directory; stage disabled"
                );
            }
        }
    }

    GraphHandle { shutdown, runners }
}

impl GraphHandle {
    /// Number of stages that actually started.
    pub fn stage_count(&self) -> usize {
        self.runners.len()
    }

    /// Close all watchers and drain every runner.
    ///
    /// Runners kill and reap their live children on the way out.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.runners {
            if let Err(err) = handle.await {
                warn!(error = %err, "stage runner task failed");
            }
        }
    }
}
