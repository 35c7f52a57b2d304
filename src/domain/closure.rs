//! Call Closure Resolution
//!
//! Computes the dependency-first order of every function reachable from a
//! top function. Callees are emitted before their callers so a closure unit
//! compiles in a single pass; each function appears once.

use std::collections::HashMap;

use crate::domain::callgraph::CallGraph;

/// Ordered, duplicate-free function names; callees before callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClosureOrder {
    order: Vec<String>,
    /// Call edges that closed a cycle and were not followed.
    back_edges: Vec<(String, String)>,
}

impl ClosureOrder {
    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.order.iter().any(|n| n == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }

    pub fn back_edges(&self) -> &[(String, String)] {
        &self.back_edges
    }

    pub fn has_cycles(&self) -> bool {
        !self.back_edges.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Resolve the closure of `top`. Returns `None` if `top` is not defined.
///
/// Only callees defined in the graph take part; library calls are ignored.
/// A callee that is still on the current DFS path closes a cycle: the edge is
/// recorded and not followed, so the members of a cycle come out in the order
/// they were first discovered.
pub fn resolve(graph: &CallGraph, top: &str) -> Option<ClosureOrder> {
    if !graph.contains(top) {
        return None;
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut closure = ClosureOrder::default();
    visit(graph, top, &mut marks, &mut closure);

    for (from, to) in &closure.back_edges {
        tracing::debug!(caller = %from, callee = %to, "[Closure] call cycle, edge not followed");
    }
    Some(closure)
}

fn visit<'g>(
    graph: &'g CallGraph,
    name: &'g str,
    marks: &mut HashMap<&'g str, Mark>,
    closure: &mut ClosureOrder,
) {
    marks.insert(name, Mark::Visiting);

    if let Some(node) = graph.get(name) {
        for callee in &node.callees {
            if !graph.contains(callee) {
                continue;
            }
            match marks.get(callee.as_str()) {
                None => visit(graph, callee, marks, closure),
                Some(Mark::Visiting) => closure
                    .back_edges
                    .push((name.to_string(), callee.clone())),
                Some(Mark::Visited) => {}
            }
        }
    }

    marks.insert(name, Mark::Visited);
    closure.order.push(name.to_string());
}
