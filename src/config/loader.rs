// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::config::model::RawConfig;

/// File name looked for in each search location.
pub const CONFIG_FILE_NAME: &str = "multiwatch.toml";

/// Resolve the user-controlled search directory.
///
/// Priority: `--dirname` flag, then `MW_DIRNAME`, then `.`.
pub fn resolve_dirname(cli_dirname: Option<&str>) -> String {
    if let Some(dir) = cli_dirname {
        return dir.to_string();
    }
    std::env::var("MW_DIRNAME").unwrap_or_else(|_| ".".to_string())
}

/// Directories searched for [`CONFIG_FILE_NAME`], in order.
pub fn search_paths(dirname: &str) -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/multiwatch")];

    if let Ok(home) = std::env::var("HOME") {
        let home = PathBuf::from(home);
        paths.push(home.join(".config").join("multiwatch"));
        paths.push(home.join(".multiwatch"));
    }

    paths.push(PathBuf::from(dirname));
    paths
}

/// Find the first existing config file in the search path.
pub fn discover(dirname: &str) -> Option<PathBuf> {
    search_paths(dirname)
        .into_iter()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Load a configuration file from a given path.
///
/// This only performs TOML deserialization; semantic validation (dependency
/// references, cycles) lives in [`crate::config::validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config file at {:?}", path))?;

    let config: RawConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML config from {:?}", path))?;

    Ok(config)
}

/// Discover and load the config file, returning it together with the path it
/// was found at (the reloader watches that path).
pub fn load(dirname: &str) -> Result<(RawConfig, PathBuf)> {
    let path = discover(dirname).ok_or_else(|| {
        anyhow!(
            "could not find {} in any of {:?}",
            CONFIG_FILE_NAME,
            search_paths(dirname)
        )
    })?;

    let config = load_from_path(&path)?;
    Ok((config, path))
}
