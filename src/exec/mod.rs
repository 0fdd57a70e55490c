// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs the commands bound to stages using `tokio::process::Command` with
//! inherited stdio, and enforces the at-most-one-child-per-stage guarantee
//! including preemption (`early-terminate`) and exit-time notification of
//! sync downstream edges.

pub mod supervisor;

pub use supervisor::{ProcessSupervisor, SpawnedChild};
