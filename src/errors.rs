// src/errors.rs

//! Crate-wide error aliases.
//!
//! A thin wrapper around `anyhow`; this module gives a single place to add
//! more structured error types later.

pub use anyhow::{Error, Result};
