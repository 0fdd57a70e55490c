use std::error::Error;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use multiwatch::config::model::RawConfig;
use multiwatch::engine::trigger::TriggerEnv;
use multiwatch::graph::stage::StageGraph;
use multiwatch::graph::wiring::{merge_upstreams, wire_stages, StageWiring, EDGE_CAPACITY};

type TestResult = Result<(), Box<dyn Error>>;

fn wiring_for<'a>(wirings: &'a mut Vec<StageWiring>, name: &str) -> &'a mut StageWiring {
    wirings
        .iter_mut()
        .find(|w| w.stage.name == name)
        .unwrap_or_else(|| panic!("no wiring for stage {name}"))
}

fn graph() -> StageGraph {
    let cfg: RawConfig = toml::from_str(
        r#"
[a]
cmd = ["true"]

[b]
cmd = ["true"]
depends = ["a"]

[c]
cmd = ["true"]
depends = [{ stage = "a", async = true }]
"#,
    )
    .expect("test config parses");

    StageGraph::from_raw(&cfg)
}

#[tokio::test]
async fn edges_land_in_the_right_subscriber_lists() -> TestResult {
    let mut wirings = wire_stages(&graph());

    {
        let a = wiring_for(&mut wirings, "a");
        assert_eq!(a.sync_subscribers.len(), 1);
        assert_eq!(a.async_subscribers.len(), 1);
        assert!(a.upstream_inputs.is_empty());
    }
    {
        let b = wiring_for(&mut wirings, "b");
        assert!(b.sync_subscribers.is_empty());
        assert!(b.async_subscribers.is_empty());
        assert_eq!(b.upstream_inputs.len(), 1);
    }
    {
        let c = wiring_for(&mut wirings, "c");
        assert_eq!(c.upstream_inputs.len(), 1);
    }

    Ok(())
}

#[tokio::test]
async fn edge_channels_connect_upstream_to_downstream() -> TestResult {
    let mut wirings = wire_stages(&graph());

    let sync_tx = wiring_for(&mut wirings, "a").sync_subscribers.remove(0);
    let mut b_rx = wiring_for(&mut wirings, "b").upstream_inputs.remove(0);

    let env = TriggerEnv {
        trigger: String::new(),
        file: "src/main.go".to_string(),
        stage: "a".to_string(),
    };
    sync_tx.send(env.clone()).await?;

    let received = timeout(Duration::from_secs(1), b_rx.recv())
        .await?
        .expect("edge channel delivers");
    assert_eq!(received, env);

    Ok(())
}

#[tokio::test]
async fn merge_fans_multiple_upstreams_into_one_stream() -> TestResult {
    let (tx1, rx1) = mpsc::channel(EDGE_CAPACITY);
    let (tx2, rx2) = mpsc::channel(EDGE_CAPACITY);

    let mut merged = merge_upstreams(vec![rx1, rx2]);

    tx1.send(TriggerEnv::boot("one")).await?;
    tx2.send(TriggerEnv::boot("two")).await?;

    let mut stages = Vec::new();
    for _ in 0..2 {
        let env = timeout(Duration::from_secs(1), merged.recv())
            .await?
            .expect("merged stream delivers");
        stages.push(env.stage);
    }
    stages.sort();
    assert_eq!(stages, vec!["one".to_string(), "two".to_string()]);

    // Dropping all senders closes the merged stream.
    drop(tx1);
    drop(tx2);
    let end = timeout(Duration::from_secs(1), merged.recv()).await?;
    assert!(end.is_none());

    Ok(())
}

#[tokio::test]
async fn merge_with_no_upstreams_is_closed() -> TestResult {
    let mut merged = merge_upstreams(Vec::new());
    assert!(merged.recv().await.is_none());

    Ok(())
}
