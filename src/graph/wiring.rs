// src/graph/wiring.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::engine::trigger::TriggerEnv;
use crate::graph::stage::{EdgeMode, Stage, StageGraph};

/// Capacity of each dependency-edge channel.
///
/// One slot approximates rendezvous semantics: an upstream can run ahead by
/// at most one unserviced notification per edge. Validation breaks cycles,
/// so the blocking sends cannot form a cycle.
pub const EDGE_CAPACITY: usize = 1;

/// Finalized channel wiring for one stage, built before any runner starts.
///
/// The subscriber lists belong to this stage in its role as an *upstream*:
/// async subscribers are notified at spawn time, sync subscribers at exit
/// time. The inbound receivers are this stage's ends of the edges it
/// declared in `depends`.
pub struct StageWiring {
    pub stage: Arc<Stage>,
    pub async_subscribers: Vec<mpsc::Sender<TriggerEnv>>,
    pub sync_subscribers: Vec<mpsc::Sender<TriggerEnv>>,
    pub upstream_inputs: Vec<mpsc::Receiver<TriggerEnv>>,
}

/// Allocate one channel per dependency edge and distribute the ends.
///
/// For each edge `(up, down, mode)`: the sender joins `up`'s async or sync
/// subscriber list and the receiver joins `down`'s inbound set.
pub fn wire_stages(graph: &StageGraph) -> Vec<StageWiring> {
    let mut wirings: BTreeMap<String, StageWiring> = graph
        .stages()
        .map(|stage| {
            (
                stage.name.clone(),
                StageWiring {
                    stage: Arc::new(stage.clone()),
                    async_subscribers: Vec::new(),
                    sync_subscribers: Vec::new(),
                    upstream_inputs: Vec::new(),
                },
            )
        })
        .collect();

    for stage in graph.stages() {
        for dep in stage.dependencies.iter() {
            let (tx, rx) = mpsc::channel(EDGE_CAPACITY);

            match wirings.get_mut(&dep.stage) {
                Some(upstream) => match dep.mode {
                    EdgeMode::Async => upstream.async_subscribers.push(tx),
                    EdgeMode::Sync => upstream.sync_subscribers.push(tx),
                },
                None => {
                    // Validation drops dangling edges; this is unreachable
                    // with a validated graph.
                    warn!(
                        stage = %stage.name,
                        dependency = %dep.stage,
                        "edge references unknown stage; skipping"
                    );
                    continue;
                }
            }

            if let Some(downstream) = wirings.get_mut(&stage.name) {
                downstream.upstream_inputs.push(rx);
            }
        }
    }

    wirings.into_values().collect()
}

/// Fan N inbound edge channels into a single receiver.
///
/// One forwarding task per upstream edge; the merged receiver closes once
/// every upstream sender is gone. With zero inputs the receiver is closed
/// from the start.
pub fn merge_upstreams(inputs: Vec<mpsc::Receiver<TriggerEnv>>) -> mpsc::Receiver<TriggerEnv> {
    let (tx, rx) = mpsc::channel(EDGE_CAPACITY);

    for mut input in inputs {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(env) = input.recv().await {
                if tx.send(env).await.is_err() {
                    break;
                }
            }
        });
    }

    rx
}
