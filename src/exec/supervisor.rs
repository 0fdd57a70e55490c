// src/exec/supervisor.rs

//! Per-stage child process supervision.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::engine::trigger::{TriggerEnv, ENV_FILE, ENV_STAGE, ENV_TRIGGER};
use crate::graph::stage::Stage;

/// Owns the at-most-one child slot of a stage.
///
/// All operations are invoked from the stage's runner, so the slot is never
/// contended. Each spawned child is waited exactly once, by its supervision
/// task; the spawn path preempts or waits by awaiting that task, which
/// guarantees the child has been reaped before the slot is reused.
pub struct ProcessSupervisor {
    stage: Arc<Stage>,
    sync_subscribers: Vec<mpsc::Sender<TriggerEnv>>,
    slot: Option<ChildSlot>,
}

/// A started child that is not yet supervised.
///
/// The runner notifies async downstream edges between
/// [`ProcessSupervisor::spawn`] and [`ProcessSupervisor::supervise`], so the
/// spawn signal is always sent before the child's exit can be observed.
pub struct SpawnedChild {
    child: Child,
}

struct ChildSlot {
    preempt: oneshot::Sender<()>,
    supervision: JoinHandle<()>,
}

impl ProcessSupervisor {
    pub fn new(stage: Arc<Stage>, sync_subscribers: Vec<mpsc::Sender<TriggerEnv>>) -> Self {
        Self {
            stage,
            sync_subscribers,
            slot: None,
        }
    }

    /// Start the stage command for the given trigger.
    ///
    /// If a prior child is outstanding it is first killed (when
    /// `early_terminate`) or waited for, and always reaped before the new
    /// process starts. Returns `None` when the process could not be
    /// started; the slot is left empty in that case.
    pub async fn spawn(&mut self, env: &TriggerEnv) -> Option<SpawnedChild> {
        self.reap_outstanding(self.stage.early_terminate).await;

        if self.stage.cmd.is_empty() {
            error!(stage = %self.stage.name, "stage has no command to run");
            return None;
        }

        let mut cmd = Command::new(&self.stage.cmd[0]);
        cmd.args(&self.stage.cmd[1..])
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .env(ENV_TRIGGER, &env.trigger)
            .env(ENV_FILE, &env.file)
            .env(ENV_STAGE, &env.stage)
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!(
                    stage = %self.stage.name,
                    cmd = %self.stage.cmd[0],
                    error = %err,
                    "could not spawn process"
                );
                return None;
            }
        };

        debug!(stage = %self.stage.name, pid = ?child.id(), "process started");
        Some(SpawnedChild { child })
    }

    /// Detach the supervision task for a started child and fill the slot.
    pub fn supervise(&mut self, spawned: SpawnedChild, env: &TriggerEnv) {
        let (preempt_tx, preempt_rx) = oneshot::channel();
        let supervision = tokio::spawn(supervise_child(
            spawned.child,
            env.clone(),
            self.stage.name.clone(),
            self.sync_subscribers.clone(),
            preempt_rx,
        ));

        self.slot = Some(ChildSlot {
            preempt: preempt_tx,
            supervision,
        });
    }

    /// Kill and reap any outstanding child; used on runner teardown.
    pub async fn shutdown(&mut self) {
        self.reap_outstanding(true).await;
    }

    async fn reap_outstanding(&mut self, preempt: bool) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        let ChildSlot {
            preempt: preempt_tx,
            supervision,
        } = slot;

        if preempt {
            let _ = preempt_tx.send(());
        } else {
            // Dropping the sender tells the supervision task to keep
            // waiting for a natural exit.
            drop(preempt_tx);
        }

        if let Err(err) = supervision.await {
            warn!(stage = %self.stage.name, error = %err, "supervision task failed");
        }
    }
}

/// Waits for the child (or a preemption request), logs abnormal exits, then
/// notifies every sync downstream edge.
///
/// Sync edges are notified on preempted exits too: the spawn succeeded and
/// an exit happened.
async fn supervise_child(
    mut child: Child,
    env: TriggerEnv,
    stage: String,
    sync_subscribers: Vec<mpsc::Sender<TriggerEnv>>,
    preempt_rx: oneshot::Receiver<()>,
) {
    tokio::select! {
        status = child.wait() => log_exit(&stage, status),
        requested = preempt_rx => {
            if requested.is_ok() {
                match child.kill().await {
                    Ok(()) => debug!(stage = %stage, "process killed before respawn"),
                    Err(err) => warn!(stage = %stage, error = %err, "failed to kill process"),
                }
            } else {
                // Slot owner went away without preempting; wait it out.
                log_exit(&stage, child.wait().await);
            }
        }
    }

    for tx in sync_subscribers.iter() {
        if tx.send(env.clone()).await.is_err() {
            debug!(stage = %stage, "downstream stage gone; dropping exit signal");
        }
    }
}

fn log_exit(stage: &str, status: std::io::Result<std::process::ExitStatus>) {
    match status {
        Ok(status) if status.success() => {
            debug!(stage = %stage, "process exited");
        }
        Ok(status) => {
            warn!(stage = %stage, status = %status, "process exited with non-zero status");
        }
        Err(err) => {
            warn!(stage = %stage, error = %err, "could not collect process exit status");
        }
    }
}
