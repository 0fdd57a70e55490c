// src/config/mod.rs

//! Configuration loading and validation for multiwatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Discover and load a config file from the search path (`loader.rs`).
//! - Validate and repair the stage/dependency structure (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{discover, load, load_from_path, resolve_dirname, CONFIG_FILE_NAME};
pub use model::{DependsItem, PatternItem, RawConfig, StageSpec};
pub use validate::validate_config;
