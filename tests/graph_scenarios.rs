#![cfg(unix)]

//! End-to-end scenarios driving real watchers and real processes.
//!
//! Output markers are always written outside the watched directories so the
//! children's writes never feed back into the watchers.

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;

use multiwatch::config::model::{DependsItem, PatternItem, RawConfig, StageSpec};
use multiwatch::config::validate::validate_config;
use multiwatch::engine::orchestrator::{self, GraphHandle};
use multiwatch::graph::stage::StageGraph;

type TestResult = Result<(), Box<dyn Error>>;

fn shell_spec(dir: &Path, script: String) -> StageSpec {
    StageSpec {
        dir: dir.display().to_string(),
        recursive: true,
        cmd: vec!["sh".to_string(), "-c".to_string(), script],
        early_terminate: true,
        start: false,
        depends: Vec::new(),
        files: vec![
            PatternItem::Bare(".*".to_string()),
            PatternItem::Qualified {
                pattern: "^\\..*".to_string(),
                exclude: true,
            },
        ],
    }
}

fn config(stages: Vec<(&str, StageSpec)>) -> RawConfig {
    RawConfig {
        dirname: None,
        loglevel: None,
        stages: stages
            .into_iter()
            .map(|(name, spec)| (name.to_string(), spec))
            .collect::<BTreeMap<_, _>>(),
    }
}

async fn boot(mut cfg: RawConfig) -> GraphHandle {
    validate_config(&mut cfg).expect("scenario config validates");
    let graph = StageGraph::from_raw(&cfg);
    orchestrator::boot(&graph, Duration::from_millis(50))
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Let the poll watchers finish their baseline scan before touching files.
async fn settle() {
    sleep(Duration::from_millis(400)).await;
}

#[tokio::test]
async fn single_stage_touch_spawns_with_file_env() -> TestResult {
    let watched = tempfile::tempdir()?;
    let outdir = tempfile::tempdir()?;
    let out = outdir.path().join("out");

    let script = format!(
        r#"printf '%s|%s|%s\n' "$MW_TRIGGER" "$MW_FILE" "$MW_STAGE" >> {}"#,
        out.display()
    );
    let handle = boot(config(vec![("s", shell_spec(watched.path(), script))])).await;
    settle().await;

    fs::write(watched.path().join("a.txt"), "hello")?;
    wait_until("stage output", || !read(&out).is_empty()).await;

    let content = read(&out);
    let line = content.lines().next().expect("one output line");
    let parts: Vec<&str> = line.split('|').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "", "filesystem triggers carry an empty MW_TRIGGER");
    assert!(parts[1].ends_with("a.txt"), "MW_FILE was {}", parts[1]);
    assert_eq!(parts[2], "s");

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn start_at_boot_spawns_once_with_empty_trigger() -> TestResult {
    let watched = tempfile::tempdir()?;
    let outdir = tempfile::tempdir()?;
    let out = outdir.path().join("out");

    let script = format!(
        r#"printf '%s|%s|%s\n' "$MW_TRIGGER" "$MW_FILE" "$MW_STAGE" >> {}"#,
        out.display()
    );
    let mut spec = shell_spec(watched.path(), script);
    spec.start = true;

    let handle = boot(config(vec![("s", spec)])).await;

    wait_until("boot spawn output", || !read(&out).is_empty()).await;
    sleep(Duration::from_millis(500)).await;

    let content = read(&out);
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, vec!["||s"]);

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn preemption_replaces_the_running_child() -> TestResult {
    let watched = tempfile::tempdir()?;
    let outdir = tempfile::tempdir()?;
    let log = outdir.path().join("log");

    let script = format!(
        "echo start >> {log}; sleep 5; echo done >> {log}",
        log = log.display()
    );
    let handle = boot(config(vec![("s", shell_spec(watched.path(), script))])).await;
    settle().await;

    fs::write(watched.path().join("a.txt"), "a")?;
    wait_until("first spawn", || read(&log).matches("start").count() == 1).await;

    fs::write(watched.path().join("b.txt"), "b")?;
    wait_until("second spawn", || read(&log).matches("start").count() == 2).await;

    handle.shutdown().await;

    // The first child was killed by preemption and the second by shutdown,
    // so neither lived the 5 seconds needed to print "done".
    let content = read(&log);
    assert_eq!(content.matches("start").count(), 2);
    assert_eq!(content.matches("done").count(), 0);

    Ok(())
}

#[tokio::test]
async fn sync_edge_spawns_downstream_after_upstream_exit() -> TestResult {
    let da = tempfile::tempdir()?;
    let db = tempfile::tempdir()?;
    let outdir = tempfile::tempdir()?;
    let log = outdir.path().join("log");

    let a_script = format!("sleep 0.3; echo a-done >> {}", log.display());
    let b_script = format!(r#"echo "b:$MW_TRIGGER" >> {}"#, log.display());

    let mut b = shell_spec(db.path(), b_script);
    b.depends = vec![DependsItem::Name("a".to_string())];

    let handle = boot(config(vec![
        ("a", shell_spec(da.path(), a_script)),
        ("b", b),
    ]))
    .await;
    settle().await;

    fs::write(da.path().join("x.txt"), "x")?;
    wait_until("downstream ran", || read(&log).contains("b:a")).await;

    let content = read(&log);
    let a_done = content.find("a-done").expect("upstream marker");
    let b_ran = content.find("b:a").expect("downstream marker");
    assert!(
        a_done < b_ran,
        "sync downstream must spawn after upstream exit: {content:?}"
    );

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn async_edges_fan_out_before_upstream_exit() -> TestResult {
    let da = tempfile::tempdir()?;
    let db = tempfile::tempdir()?;
    let dc = tempfile::tempdir()?;
    let outdir = tempfile::tempdir()?;
    let log = outdir.path().join("log");

    let a_script = format!(
        "echo a-start >> {log}; sleep 3; echo a-done >> {log}",
        log = log.display()
    );
    let async_dep = || {
        vec![DependsItem::Edge {
            stage: "a".to_string(),
            r#async: true,
        }]
    };

    let mut b = shell_spec(db.path(), format!("echo b-run >> {}", log.display()));
    b.depends = async_dep();
    let mut c = shell_spec(dc.path(), format!("echo c-run >> {}", log.display()));
    c.depends = async_dep();

    let handle = boot(config(vec![
        ("a", shell_spec(da.path(), a_script)),
        ("b", b),
        ("c", c),
    ]))
    .await;
    settle().await;

    fs::write(da.path().join("x.txt"), "x")?;
    wait_until("async fan-out", || {
        let content = read(&log);
        content.contains("b-run") && content.contains("c-run")
    })
    .await;

    // Both downstreams ran while the upstream command was still sleeping.
    assert!(!read(&log).contains("a-done"));

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn excluded_basenames_never_trigger() -> TestResult {
    let watched = tempfile::tempdir()?;
    let outdir = tempfile::tempdir()?;
    let out = outdir.path().join("out");

    let script = format!(r#"echo "$MW_FILE" >> {}"#, out.display());
    let handle = boot(config(vec![("s", shell_spec(watched.path(), script))])).await;
    settle().await;

    fs::write(watched.path().join(".hidden"), "h")?;
    sleep(Duration::from_millis(500)).await;
    fs::write(watched.path().join("visible.go"), "v")?;

    wait_until("visible file trigger", || read(&out).contains("visible.go")).await;
    sleep(Duration::from_millis(400)).await;

    let content = read(&out);
    assert_eq!(content.lines().count(), 1, "output was {content:?}");
    assert!(!content.contains(".hidden"));

    handle.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unwatchable_directory_disables_that_stage_only() -> TestResult {
    let watched = tempfile::tempdir()?;
    let outdir = tempfile::tempdir()?;
    let out = outdir.path().join("out");

    let mut ok = shell_spec(watched.path(), format!("echo ran >> {}", out.display()));
    ok.start = true;

    let broken = shell_spec(
        Path::new("/nonexistent/multiwatch-test-dir"),
        "echo never".to_string(),
    );

    let handle = boot(config(vec![("ok", ok), ("broken", broken)])).await;
    assert_eq!(handle.stage_count(), 1);

    wait_until("surviving stage ran", || read(&out).contains("ran")).await;

    handle.shutdown().await;
    Ok(())
}
