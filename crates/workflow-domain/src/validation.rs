//! `WorkflowDefinition` validation (§3, §4.1, §8 property 2 "DAG validity").
//!
//! Cycle detection follows the teacher's Kahn's-algorithm topological sort
//! (`dag::builder::DagBuilder::validate_no_cycles`), generalized from a
//! phase-dependency list to the workflow's `nodes`/`edges` graph.

use std::collections::{HashMap, HashSet, VecDeque};

use platform_core::errors::ValidationError;

use crate::model::{NodeKind, WorkflowDefinition};

pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    for (key, node) in &def.nodes {
        if &node.id != key {
            violations.push(format!(
                "nodes.{key}: node.id ({}) must equal its map key",
                node.id
            ));
        }
    }

    if !def.nodes.contains_key(&def.entrypoint) {
        violations.push(format!(
            "entrypoint: references unknown node '{}'",
            def.entrypoint
        ));
    }

    for (i, edge) in def.edges.iter().enumerate() {
        if !def.nodes.contains_key(&edge.from) {
            violations.push(format!("edges[{i}].from: unknown node '{}'", edge.from));
        }
        if !def.nodes.contains_key(&edge.to) {
            violations.push(format!("edges[{i}].to: unknown node '{}'", edge.to));
        }
    }

    for (key, node) in &def.nodes {
        for next_key in &node.next {
            if !def.nodes.contains_key(next_key) {
                violations.push(format!(
                    "nodes.{key}.next: unknown node '{next_key}'"
                ));
            }
        }
        if let NodeKind::Condition(cfg) = &node.kind {
            if cfg.expression.trim().is_empty() {
                violations.push(format!("nodes.{key}.config.expression: must not be empty"));
            }
            // Note: a selectedBranch absent from `next` is explicitly
            // allowed by the spec (§9 open question 3) and is NOT checked
            // here; only that a *declared* branch key, if present, refers
            // to a real node.
            for branch in [&cfg.true_branch, &cfg.false_branch].into_iter().flatten() {
                if !def.nodes.contains_key(branch) {
                    violations.push(format!(
                        "nodes.{key}.config: branch '{branch}' is not a known node"
                    ));
                }
            }
        }
    }

    if let Some(cycle) = find_cycle(def) {
        violations.push(format!(
            "definition: cycle detected among nodes {cycle:?}"
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            violations: violations
                .into_iter()
                .map(|message| platform_core::errors::FieldViolation {
                    path: "definition".into(),
                    message,
                })
                .collect(),
        })
    }
}

/// Kahn's algorithm over the union of `edges` and every node's `next` list.
/// Returns the node keys still stuck with a nonzero in-degree when the
/// topological sort stalls, i.e. the nodes participating in a cycle.
fn find_cycle(def: &WorkflowDefinition) -> Option<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = def.nodes.keys().map(|k| (k.as_str(), 0)).collect();

    let push_edge = |from: &str, to: &str, adjacency: &mut HashMap<&str, Vec<&str>>, in_degree: &mut HashMap<&str, usize>| {
        if let (Some(from_key), Some(to_key)) = (
            def.nodes.get_key_value(from).map(|(k, _)| k.as_str()),
            def.nodes.get_key_value(to).map(|(k, _)| k.as_str()),
        ) {
            adjacency.entry(from_key).or_default().push(to_key);
            *in_degree.entry(to_key).or_insert(0) += 1;
        }
    };

    for edge in &def.edges {
        push_edge(&edge.from, &edge.to, &mut adjacency, &mut in_degree);
    }
    for (key, node) in &def.nodes {
        for next in &node.next {
            push_edge(key, next, &mut adjacency, &mut in_degree);
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(k, _)| *k)
        .collect();

    let mut processed: HashSet<&str> = HashSet::new();
    while let Some(node) = queue.pop_front() {
        processed.insert(node);
        for &dependent in adjacency.get(node).into_iter().flatten() {
            let deg = in_degree.get_mut(dependent).unwrap();
            *deg -= 1;
            if *deg == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if processed.len() == def.nodes.len() {
        None
    } else {
        Some(
            def.nodes
                .keys()
                .filter(|k| !processed.contains(k.as_str()))
                .cloned()
                .collect(),
        )
    }
}
