// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use dub_graph::{Graph, NodeId};

/// The double diamond:
///
/// ```text
/// Entry -> 1; 1 -> 2, 6; 2 -> 3, 4; 3 -> 5; 4 -> 5; 5 -> 7; 6 -> 7; 7 -> Exit
/// ```
///
/// Returns the graph and the nodes named 1 to 7, at indices 1 to 7 (index 0 is
/// Entry).
pub fn double_diamond() -> (Graph, [NodeId; 8]) {
    let mut graph = Graph::new();
    let arities = [2, 2, 1, 1, 1, 1, 1];
    let mut n = [Graph::ENTRY; 8];
    for (i, arity) in arities.iter().enumerate() {
        n[i + 1] = graph.create_node(*arity);
    }
    graph.connect(Graph::ENTRY, 0, n[1]);
    graph.connect(n[1], 0, n[2]);
    graph.connect(n[1], 1, n[6]);
    graph.connect(n[2], 0, n[3]);
    graph.connect(n[2], 1, n[4]);
    graph.connect(n[3], 0, n[5]);
    graph.connect(n[4], 0, n[5]);
    graph.connect(n[5], 0, n[7]);
    graph.connect(n[6], 0, n[7]);
    graph.connect(n[7], 0, Graph::EXIT);
    (graph, n)
}

/// Xorshift generator so graph shapes are reproducible without extra crates.
pub struct Shapes(u64);

impl Shapes {
    pub fn new(seed: u64) -> Self {
        Shapes(seed.max(1))
    }

    pub fn below(&mut self, bound: usize) -> usize {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 % bound as u64) as usize
    }
}

/// A graph of `size` nodes chained through slot 0, so every node is reachable.
/// Roughly half the nodes get a second exit to a random node or to Exit.
pub fn chained_graph(shapes: &mut Shapes, size: usize) -> Graph {
    let mut graph = Graph::new();
    let nodes: Vec<NodeId> = (0..size)
        .map(|_| {
            let arity = 1 + shapes.below(2);
            graph.create_node(arity)
        })
        .collect();
    graph.connect(Graph::ENTRY, 0, nodes[0]);
    for (i, &node) in nodes.iter().enumerate() {
        let next = nodes.get(i + 1).copied().unwrap_or(Graph::EXIT);
        graph.connect(node, 0, next);
        if graph.num_exits(node) == 2 {
            let pick = shapes.below(size + 1);
            let target = nodes.get(pick).copied().unwrap_or(Graph::EXIT);
            graph.connect(node, 1, target);
        }
    }
    graph
}

/// Nodes reachable from Entry without passing through `avoid`.
pub fn reachable_avoiding(graph: &Graph, avoid: Option<NodeId>) -> Vec<bool> {
    let mut seen = vec![false; graph.num_nodes()];
    if avoid == Some(Graph::ENTRY) {
        return seen;
    }
    let mut stack = vec![Graph::ENTRY];
    seen[Graph::ENTRY.index()] = true;
    while let Some(node) = stack.pop() {
        for succ in graph.successors(node) {
            if Some(succ) != avoid && !seen[succ.index()] {
                seen[succ.index()] = true;
                stack.push(succ);
            }
        }
    }
    seen
}

/// `a` dominates `b` by definition: `b` is reachable, and unreachable once `a`
/// is removed.
pub fn brute_dominates(graph: &Graph, a: NodeId, b: NodeId) -> bool {
    if !reachable_avoiding(graph, None)[b.index()] {
        return false;
    }
    a == b || !reachable_avoiding(graph, Some(a))[b.index()]
}
