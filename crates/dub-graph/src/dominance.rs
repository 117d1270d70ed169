// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Dominance analysis.
//!
//! - Reverse postorder numbering of the reachable part of a graph
//! - Immediate dominators with the iterative algorithm of Cooper, Harvey and
//!   Kennedy ("A Simple, Fast Dominance Algorithm")
//! - Dominance frontiers, walking each join point's predecessors up the
//!   dominator tree

use crate::graph::{Graph, NodeId};
use itertools::Itertools;
use log::debug;
use std::collections::BTreeSet;
use std::fmt;

/// Reverse postorder of the nodes reachable from Entry.
///
/// Exit is always numbered, and always last, even when nothing reaches it.
/// Unreachable nodes have no index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversePostorder {
    order: Vec<NodeId>,
    index: Vec<Option<usize>>,
}

impl ReversePostorder {
    pub fn compute(graph: &Graph) -> Self {
        let mut visited = vec![false; graph.num_nodes()];
        let mut postorder = Vec::with_capacity(graph.num_nodes());

        visited[Graph::EXIT.index()] = true;
        postorder.push(Graph::EXIT);

        // (node, exit slots not yet looked at); slots are taken from the back
        // so that slot 0 ends up first once the order is reversed.
        let mut stack = vec![(Graph::ENTRY, graph.num_exits(Graph::ENTRY))];
        visited[Graph::ENTRY.index()] = true;
        while let Some(top) = stack.last_mut() {
            let (node, remaining) = *top;
            if remaining == 0 {
                stack.pop();
                postorder.push(node);
                continue;
            }
            top.1 -= 1;
            if let Some(next) = graph.successor(node, remaining - 1) {
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    stack.push((next, graph.num_exits(next)));
                }
            }
        }

        postorder.reverse();
        let mut index = vec![None; graph.num_nodes()];
        for (position, node) in postorder.iter().enumerate() {
            index[node.index()] = Some(position);
        }
        ReversePostorder {
            order: postorder,
            index,
        }
    }

    /// Numbered nodes, Entry first and Exit last.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn index(&self, node: NodeId) -> Option<usize> {
        self.index.get(node.index()).copied().flatten()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.index(node).is_some()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// An edge is a back edge iff its source does not come strictly before its
    /// destination.
    pub fn is_back_edge(&self, src: NodeId, dst: NodeId) -> bool {
        self.rank(src) >= self.rank(dst)
    }

    fn rank(&self, node: NodeId) -> usize {
        self.index(node)
            .unwrap_or_else(|| panic!("{} is unreachable and has no order index", node))
    }
}

/// Computes the immediate dominator of every numbered node. `Entry` is its own
/// immediate dominator; nodes without a reachable predecessor (unreachable
/// nodes, or an Exit that nothing reaches) get `None`.
pub fn find_idoms(graph: &Graph, rpo: &ReversePostorder) -> Vec<Option<NodeId>> {
    let mut idom = vec![None; graph.num_nodes()];
    let Some((&entry, rest)) = rpo.order().split_first() else {
        return idom;
    };
    idom[entry.index()] = Some(entry);

    // Forward predecessors are always numbered before the node itself, so a
    // single pass in reverse postorder sees all of them processed.
    for &node in rest {
        let rank = rpo.rank(node);
        let mut new_idom = None;
        for pred in graph.predecessors(node) {
            match rpo.index(pred) {
                Some(pred_rank) if pred_rank < rank && idom[pred.index()].is_some() => {
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, rpo, pred, current),
                    });
                }
                _ => {}
            }
        }
        idom[node.index()] = new_idom;
    }

    // Back edges can only refine join points.
    let mut rounds = 1;
    let mut changed = true;
    while changed {
        changed = false;
        rounds += 1;
        for &node in rest {
            if graph.num_entries(node) < 2 {
                continue;
            }
            let mut new_idom = None;
            for pred in graph.predecessors(node) {
                if idom[pred.index()].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => pred,
                    Some(current) => intersect(&idom, rpo, pred, current),
                });
            }
            if new_idom != idom[node.index()] {
                idom[node.index()] = new_idom;
                changed = true;
            }
        }
    }
    debug!("dominators converged after {} rounds over {} nodes", rounds, rpo.len());

    idom
}

fn intersect(
    idom: &[Option<NodeId>],
    rpo: &ReversePostorder,
    mut a: NodeId,
    mut b: NodeId,
) -> NodeId {
    let parent = |node: NodeId| idom[node.index()].expect("processed node has an idom");
    while a != b {
        while rpo.rank(a) > rpo.rank(b) {
            a = parent(a);
        }
        while rpo.rank(b) > rpo.rank(a) {
            b = parent(b);
        }
    }
    a
}

/// The dominator tree of a graph together with the numbering it was built on.
#[derive(Debug, Clone)]
pub struct Dominators {
    rpo: ReversePostorder,
    idom: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
}

impl Dominators {
    pub fn compute(graph: &Graph) -> Self {
        Self::with_order(graph, ReversePostorder::compute(graph))
    }

    pub fn with_order(graph: &Graph, rpo: ReversePostorder) -> Self {
        let idom = find_idoms(graph, &rpo);
        let mut children = vec![Vec::new(); graph.num_nodes()];
        for &node in rpo.order().iter().skip(1) {
            if let Some(parent) = idom[node.index()] {
                children[parent.index()].push(node);
            }
        }
        Dominators {
            rpo,
            idom,
            children,
        }
    }

    pub fn order(&self) -> &ReversePostorder {
        &self.rpo
    }

    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.idom(node).is_some()
    }

    /// Immediate dominator of `node`. Entry is its own immediate dominator.
    pub fn idom(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(node.index()).copied().flatten()
    }

    pub fn idoms(&self) -> &[Option<NodeId>] {
        &self.idom
    }

    /// Dominator tree children of `node`, in reverse postorder.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.children[node.index()]
    }

    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        let (Some(rank_a), Some(_)) = (self.rpo.index(a), self.idom(b)) else {
            return false;
        };
        let mut runner = b;
        while self.rpo.rank(runner) > rank_a {
            runner = self.idom(runner).expect("reachable node has an idom");
        }
        runner == a
    }

    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }
}

/// Panics if a reachable node has an entry from an unreachable one.
///
/// Frontier computation walks every predecessor up the dominator tree and
/// silently produces garbage for such entries.
pub fn assert_no_dead_entries(graph: &Graph, rpo: &ReversePostorder) {
    for &node in rpo.order() {
        for (edge, src) in graph.entries(node) {
            assert!(
                rpo.contains(src),
                "{} enters reachable {} from unreachable {}",
                edge,
                node,
                src
            );
        }
    }
}

/// Dominance frontier of every reachable node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DominanceFrontiers {
    frontiers: Vec<BTreeSet<NodeId>>,
}

impl DominanceFrontiers {
    pub fn compute(graph: &Graph, dom: &Dominators) -> Self {
        assert_no_dead_entries(graph, dom.order());

        let mut frontiers = vec![BTreeSet::new(); graph.num_nodes()];
        for &node in dom.order().order() {
            if graph.num_entries(node) < 2 {
                continue;
            }
            let target = dom.idom(node).expect("join point has an idom");
            for pred in graph.predecessors(node) {
                let mut runner = pred;
                while runner != target {
                    frontiers[runner.index()].insert(node);
                    runner = dom.idom(runner).expect("reachable node has an idom");
                }
            }
        }
        DominanceFrontiers { frontiers }
    }

    pub fn frontier(&self, node: NodeId) -> &BTreeSet<NodeId> {
        &self.frontiers[node.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &BTreeSet<NodeId>)> {
        self.frontiers
            .iter()
            .enumerate()
            .filter(|(_, frontier)| !frontier.is_empty())
            .map(|(index, frontier)| (NodeId::new(index), frontier))
    }
}

impl fmt::Display for ReversePostorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.order.iter().join(", "))
    }
}

impl fmt::Display for DominanceFrontiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (node, frontier) in self.iter() {
            writeln!(f, "DF({}) = {{{}}}", node, frontier.iter().join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Entry -> a -> {b, c} -> d -> Exit, with a back edge d -> a.
    fn loop_graph() -> (Graph, [NodeId; 4]) {
        let mut graph = Graph::new();
        let a = graph.create_node(2);
        let b = graph.create_node(1);
        let c = graph.create_node(1);
        let d = graph.create_node(2);
        graph.connect(Graph::ENTRY, 0, a);
        graph.connect(a, 0, b);
        graph.connect(a, 1, c);
        graph.connect(b, 0, d);
        graph.connect(c, 0, d);
        graph.connect(d, 0, a);
        graph.connect(d, 1, Graph::EXIT);
        (graph, [a, b, c, d])
    }

    #[test]
    fn slot_zero_comes_first() {
        let (graph, [a, b, c, d]) = loop_graph();
        let rpo = ReversePostorder::compute(&graph);
        assert_eq!(rpo.order(), &[Graph::ENTRY, a, b, c, d, Graph::EXIT]);
        assert!(rpo.is_back_edge(d, a));
        assert!(!rpo.is_back_edge(a, d));
        assert_eq!(rpo.to_string(), "[n0, n2, n3, n4, n5, n1]");
    }

    #[test]
    fn loop_header_dominates_body() {
        let (graph, [a, b, c, d]) = loop_graph();
        let dom = Dominators::compute(&graph);
        assert_eq!(dom.idom(a), Some(Graph::ENTRY));
        assert_eq!(dom.idom(b), Some(a));
        assert_eq!(dom.idom(c), Some(a));
        assert_eq!(dom.idom(d), Some(a));
        assert_eq!(dom.idom(Graph::EXIT), Some(d));
        assert!(dom.dominates(a, d));
        assert!(!dom.dominates(b, d));
        assert!(dom.strictly_dominates(Graph::ENTRY, a));
        assert!(!dom.strictly_dominates(a, a));
        assert_eq!(dom.children(a), &[b, c, d]);
    }

    #[test]
    fn loop_header_is_in_its_own_frontier() {
        let (graph, [a, b, c, d]) = loop_graph();
        let dom = Dominators::compute(&graph);
        let df = DominanceFrontiers::compute(&graph, &dom);
        assert_eq!(df.frontier(b), &BTreeSet::from([d]));
        assert_eq!(df.frontier(c), &BTreeSet::from([d]));
        assert_eq!(df.frontier(d), &BTreeSet::from([a]));
        assert_eq!(df.frontier(a), &BTreeSet::from([a]));
        assert_eq!(df.to_string(), "DF(n2) = {n2}\nDF(n3) = {n5}\nDF(n4) = {n5}\nDF(n5) = {n2}\n");
    }

    #[test]
    fn unreachable_nodes_are_not_numbered() {
        let mut graph = Graph::new();
        let live = graph.create_node(1);
        let dead = graph.create_node(1);
        graph.connect(Graph::ENTRY, 0, live);
        graph.connect(live, 0, Graph::EXIT);
        let rpo = ReversePostorder::compute(&graph);
        assert_eq!(rpo.index(dead), None);
        let dom = Dominators::with_order(&graph, rpo);
        assert!(!dom.is_reachable(dead));
        assert!(!dom.dominates(live, dead));
    }

    #[test]
    fn unreached_exit_is_still_last() {
        let mut graph = Graph::new();
        let spin = graph.create_node(1);
        graph.connect(Graph::ENTRY, 0, spin);
        graph.connect(spin, 0, spin);
        let dom = Dominators::compute(&graph);
        assert_eq!(dom.order().order().last(), Some(&Graph::EXIT));
        assert_eq!(dom.idom(Graph::EXIT), None);
        assert_eq!(dom.idom(spin), Some(Graph::ENTRY));
    }

    #[test]
    #[should_panic(expected = "from unreachable")]
    fn dead_entries_are_rejected() {
        let mut graph = Graph::new();
        let live = graph.create_node(1);
        let dead = graph.create_node(1);
        graph.connect(Graph::ENTRY, 0, live);
        graph.connect(live, 0, Graph::EXIT);
        graph.connect(dead, 0, Graph::EXIT);
        let dom = Dominators::compute(&graph);
        DominanceFrontiers::compute(&graph, &dom);
    }
}
