// src/engine/runner.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::trigger::TriggerEnv;
use crate::exec::supervisor::ProcessSupervisor;
use crate::graph::stage::Stage;
use crate::graph::wiring::{merge_upstreams, StageWiring};
use crate::watch::source::{FsEvent, WatchSource};

/// What a loop iteration was woken up by. At most one source is served per
/// iteration; selection across ready sources is non-deterministic.
enum Served {
    Closed,
    WatchError(notify::Error),
    WatchEvent(FsEvent),
    Parent(TriggerEnv),
    ParentsGone,
}

/// The per-stage event loop.
///
/// Multiplexes the closed signal, the stage's watch event and error
/// streams, and the merged upstream edges; every served trigger goes
/// through the single spawn path in [`fire`](Self::fire).
pub struct StageRunner {
    stage: Arc<Stage>,
    watch: WatchSource,
    supervisor: ProcessSupervisor,
    async_subscribers: Vec<mpsc::Sender<TriggerEnv>>,
    parent_rx: mpsc::Receiver<TriggerEnv>,
    shutdown: CancellationToken,
}

impl StageRunner {
    pub fn new(wiring: StageWiring, watch: WatchSource, shutdown: CancellationToken) -> Self {
        let StageWiring {
            stage,
            async_subscribers,
            sync_subscribers,
            upstream_inputs,
        } = wiring;

        let supervisor = ProcessSupervisor::new(stage.clone(), sync_subscribers);
        let parent_rx = merge_upstreams(upstream_inputs);

        Self {
            stage,
            watch,
            supervisor,
            async_subscribers,
            parent_rx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!(stage = %self.stage.name, dir = ?self.stage.dir, "stage runner started");

        if self.stage.start {
            let env = TriggerEnv::boot(&self.stage.name);
            self.fire(env).await;
        }

        let mut parents_open = true;

        loop {
            let served = tokio::select! {
                _ = self.shutdown.cancelled() => Served::Closed,
                err = self.watch.errors.recv() => match err {
                    Some(err) => Served::WatchError(err),
                    None => Served::Closed,
                },
                event = self.watch.events.recv() => match event {
                    Some(event) => Served::WatchEvent(event),
                    None => Served::Closed,
                },
                env = self.parent_rx.recv(), if parents_open => match env {
                    Some(env) => Served::Parent(env),
                    None => Served::ParentsGone,
                },
            };

            match served {
                Served::Closed => break,
                Served::WatchError(err) => {
                    error!(stage = %self.stage.name, error = %err, "watch error");
                }
                Served::WatchEvent(event) => {
                    debug!(
                        stage = %self.stage.name,
                        path = ?event.path,
                        kind = ?event.kind,
                        "file changed"
                    );
                    let env = TriggerEnv::file_change(&self.stage.name, &event.path);
                    self.fire(env).await;
                }
                Served::Parent(cause) => {
                    info!(stage = %self.stage.name, upstream = %cause.stage, "reloading");
                    let env = TriggerEnv::upstream(&self.stage.name, &cause);
                    self.fire(env).await;
                }
                Served::ParentsGone => parents_open = false,
            }
        }

        self.supervisor.shutdown().await;
        info!(stage = %self.stage.name, "stage runner stopped");
    }

    /// The single spawn path used by all triggers.
    ///
    /// Async downstream edges are notified between process start and
    /// supervision, so the spawn signal is always sent before the child's
    /// exit can be observed; sync edges are notified by the supervision
    /// task when the child exits. A failed start notifies nobody.
    async fn fire(&mut self, env: TriggerEnv) {
        let Some(spawned) = self.supervisor.spawn(&env).await else {
            return;
        };

        for tx in self.async_subscribers.iter() {
            if tx.send(env.clone()).await.is_err() {
                debug!(stage = %self.stage.name, "downstream stage gone; dropping spawn signal");
            }
        }

        self.supervisor.supervise(spawned, &env);
    }
}
