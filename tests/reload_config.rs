use std::error::Error;
use std::fs;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use multiwatch::reload::watch_config;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn config_file_change_is_signalled() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("multiwatch.toml");
    fs::write(&path, "[a]\ncmd = [\"true\"]\n")?;

    let mut watcher = watch_config(&path, Duration::from_millis(50))?;

    // Cross the mtime granularity of coarse filesystems before rewriting.
    sleep(Duration::from_millis(1100)).await;
    fs::write(&path, "[a]\ncmd = [\"false\"]\n")?;

    let change = timeout(Duration::from_secs(3), watcher.changes.recv()).await?;
    assert_eq!(change, Some(()));

    Ok(())
}

#[tokio::test]
async fn missing_config_file_cannot_be_watched() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("multiwatch.toml");

    assert!(watch_config(&path, Duration::from_millis(50)).is_err());

    Ok(())
}
