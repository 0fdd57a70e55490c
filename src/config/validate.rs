// src/config/validate.rs

use anyhow::{anyhow, Result};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::RawConfig;

/// Run semantic validation against a loaded configuration, repairing what
/// can be repaired in place.
///
/// - stages with an empty name or an explicitly empty `cmd` are skipped
/// - `depends` entries referencing an unknown stage (or the stage itself)
///   are dropped
/// - dependency cycles are broken by dropping a cycle-closing edge
///
/// Each repair is logged as a warning. The only fatal condition is a config
/// with no usable stage left.
pub fn validate_config(cfg: &mut RawConfig) -> Result<()> {
    drop_unusable_stages(cfg);
    drop_dangling_dependencies(cfg);
    break_cycles(cfg);

    if cfg.stages.is_empty() {
        return Err(anyhow!("config must contain at least one usable stage"));
    }
    Ok(())
}

fn drop_unusable_stages(cfg: &mut RawConfig) {
    cfg.stages.retain(|name, spec| {
        if name.is_empty() {
            warn!("skipping stage with empty name");
            return false;
        }
        if spec.cmd.is_empty() {
            warn!(stage = %name, "skipping stage with empty cmd");
            return false;
        }
        true
    });
}

fn drop_dangling_dependencies(cfg: &mut RawConfig) {
    let names: Vec<String> = cfg.stages.keys().cloned().collect();

    for (name, spec) in cfg.stages.iter_mut() {
        spec.depends.retain(|dep| {
            if dep.stage() == name {
                warn!(stage = %name, "stage depends on itself; dropping edge");
                return false;
            }
            if !names.iter().any(|n| n == dep.stage()) {
                warn!(
                    stage = %name,
                    dependency = %dep.stage(),
                    "dependency doesn't exist as a stage; dropping edge"
                );
                return false;
            }
            true
        });
    }
}

/// Break dependency cycles so that runners can never form a cycle of
/// blocking sends.
///
/// Edge direction in the graph is upstream -> downstream. On each pass a
/// topological sort either succeeds or reports a node on a cycle; that
/// node's first cycle-closing `depends` entry is dropped and the sort is
/// retried until the graph is acyclic.
fn break_cycles(cfg: &mut RawConfig) {
    loop {
        let broken = {
            let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

            for name in cfg.stages.keys() {
                graph.add_node(name.as_str());
            }
            for (name, spec) in cfg.stages.iter() {
                for dep in spec.depends.iter() {
                    graph.add_edge(dep.stage(), name.as_str(), ());
                }
            }

            match toposort(&graph, None) {
                Ok(_order) => None,
                Err(cycle) => {
                    let node = cycle.node_id();
                    // An incoming edge `dep -> node` closes a cycle iff the
                    // node can reach `dep` going downstream.
                    cfg.stages[node].depends.iter().position(|dep| {
                        has_path_connecting(&graph, node, dep.stage(), None)
                    }).map(|idx| (node.to_string(), idx))
                }
            }
        };

        match broken {
            None => return,
            Some((node, idx)) => {
                if let Some(spec) = cfg.stages.get_mut(&node) {
                    let dep = spec.depends.remove(idx);
                    warn!(
                        stage = %node,
                        dependency = %dep.stage(),
                        "dependency cycle detected; dropping edge"
                    );
                }
            }
        }
    }
}
