// src/watch/mod.rs

//! File watching for stages.
//!
//! This module is responsible for:
//! - Evaluating a stage's basename filter list (`filter.rs`).
//! - Wrapping the polling filesystem watcher and normalizing its events
//!   (`source.rs`).
//!
//! It does **not** know about dependencies or processes; it only turns
//! filesystem changes into per-stage events.

pub mod filter;
pub mod source;

pub use filter::PatternFilter;
pub use source::{attach, FsEvent, FsEventKind, WatchSource};
