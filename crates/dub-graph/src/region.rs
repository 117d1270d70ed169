// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Compositional CFG construction.
//!
//! A [`Region`] is a graph fragment with one entry edge and a fixed number of
//! exit groups, one per flow kind. Exit groups hold dangling edges; wiring a
//! group into a node or splicing another region onto it consumes the group.
//! A structured lowering pass can translate nested syntax into a CFG this way
//! without ever naming a basic block.
//!
//! Flow kinds are plain indices here. Group 0 is the fall-through flow: a
//! fresh region keeps its dangling entry edge there, so an empty region simply
//! passes control through.

use crate::graph::{EdgeId, Graph, NodeId};
use log::trace;
use std::mem;

/// Index of an exit group.
pub type Flow = usize;

#[derive(Debug, Clone)]
pub struct Region {
    entry: EdgeId,
    exits: Vec<Vec<EdgeId>>,
    /// Whether the entry edge belongs to a private head node created for this
    /// region. Such a head is never reachable and must be bypassed by
    /// [`Region::splice`].
    owns_entry: bool,
}

impl Region {
    /// Creates an empty region with a private entry node.
    pub fn new(graph: &mut Graph, num_flows: usize) -> Self {
        let head = graph.create_node(1);
        let entry = graph.exit_edge(head, 0);
        let mut region = Self::from_edge(graph, entry, num_flows);
        region.owns_entry = true;
        region
    }

    /// Creates an empty region entered through exit slot 0 of `node`.
    pub fn rooted(graph: &Graph, node: NodeId, num_flows: usize) -> Self {
        Self::from_edge(graph, graph.exit_edge(node, 0), num_flows)
    }

    /// Creates an empty region entered through an existing dangling edge.
    pub fn from_edge(graph: &Graph, edge: EdgeId, num_flows: usize) -> Self {
        assert!(num_flows > 0, "a region needs at least one flow group");
        assert!(
            graph.edge_dst(edge).is_none(),
            "region entry {} is already attached",
            edge
        );
        let mut exits = vec![Vec::new(); num_flows];
        exits[0].push(edge);
        Region {
            entry: edge,
            exits,
            owns_entry: false,
        }
    }

    pub fn entry_edge(&self) -> EdgeId {
        self.entry
    }

    /// The first node of the region, once something has been wired in.
    pub fn head(&self, graph: &Graph) -> Option<NodeId> {
        graph.edge_dst(self.entry)
    }

    pub fn num_flows(&self) -> usize {
        self.exits.len()
    }

    /// Whether control can currently leave the region through `flow`.
    pub fn has_flow(&self, flow: Flow) -> bool {
        !self.exits[flow].is_empty()
    }

    pub fn flow_edges(&self, flow: Flow) -> &[EdgeId] {
        &self.exits[flow]
    }

    pub fn take_flow(&mut self, flow: Flow) -> Vec<EdgeId> {
        mem::take(&mut self.exits[flow])
    }

    /// Adds a dangling edge to an exit group.
    pub fn register_exit(&mut self, edge: EdgeId, flow: Flow) {
        self.exits[flow].push(edge);
    }

    /// Wires every dangling edge of `flow` into `node`.
    pub fn connect(&mut self, graph: &mut Graph, flow: Flow, node: NodeId) {
        let edges = self.take_flow(flow);
        assert!(
            !edges.is_empty(),
            "connecting empty flow group {} to {}: the path cannot be reached",
            flow,
            node
        );
        for edge in edges {
            graph.attach(edge, node);
        }
    }

    /// Routes every unattached exit slot `i` of `node` into group `i`.
    pub fn attach_default_exits(&mut self, graph: &Graph, node: NodeId) {
        assert!(
            graph.num_exits(node) <= self.exits.len(),
            "{} has {} exits but the region only has {} flow groups",
            node,
            graph.num_exits(node),
            self.exits.len()
        );
        for (edge, dst) in graph.exits(node) {
            if dst.is_none() {
                self.exits[graph.edge_slot(edge)].push(edge);
            }
        }
    }

    /// Routes every unattached exit slot of `node` into the single group `flow`.
    pub fn attach_flow(&mut self, graph: &Graph, flow: Flow, node: NodeId) {
        for (edge, dst) in graph.exits(node) {
            if dst.is_none() {
                self.exits[flow].push(edge);
            }
        }
    }

    /// Continues the `flow` exits of this region with `other`.
    ///
    /// If `other` already has a head, its entry edge is replaced by this
    /// region's dangling edges. If it is still empty, the dangling edges take
    /// the place of its entry edge in whichever group holds it. Either way the
    /// exit groups of `other` are merged into the same groups of `self`.
    pub fn splice(&mut self, graph: &mut Graph, flow: Flow, mut other: Region) {
        assert_eq!(
            self.exits.len(),
            other.exits.len(),
            "splicing regions with different flow layouts"
        );
        let edges = self.take_flow(flow);
        assert!(
            !edges.is_empty(),
            "splicing into empty flow group {}: the path cannot be reached",
            flow
        );

        match graph.edge_dst(other.entry) {
            Some(head) => {
                trace!("splice: {} edges of flow {} now enter {}", edges.len(), flow, head);
                graph.replace_edge_with_multiple(other.entry, &edges);
            }
            None => {
                let group = other
                    .exits
                    .iter()
                    .position(|group| group.contains(&other.entry))
                    .expect("an empty region keeps its entry edge in one of its groups");
                trace!("splice: flow {} passes through an empty region into flow {}", flow, group);
                other.exits[group].retain(|edge| *edge != other.entry);
                self.exits[group].extend(edges);
            }
        }

        for (flow, group) in other.exits.into_iter().enumerate() {
            self.exits[flow].extend(group);
        }
    }

    /// Moves every edge of `src` into `dst`.
    pub fn merge_flow_into(&mut self, src: Flow, dst: Flow) {
        let edges = self.take_flow(src);
        self.exits[dst].extend(edges);
    }

    pub fn swap(&mut self, a: Flow, b: Flow) {
        self.exits.swap(a, b);
    }

    /// Merges every exit group of `other` into this region.
    ///
    /// Only regions entered through a live edge (see [`Region::rooted`] and
    /// [`Region::from_edge`]) can be absorbed: their entry is already part of
    /// the graph, wired or still dangling in one of the merged groups.
    pub fn absorb_exits(&mut self, other: Region) {
        assert!(
            !other.owns_entry,
            "cannot absorb a region with a private entry node; splice it instead"
        );
        assert_eq!(
            self.exits.len(),
            other.exits.len(),
            "absorbing a region with a different flow layout"
        );
        for (flow, group) in other.exits.into_iter().enumerate() {
            self.exits[flow].extend(group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NORMAL: Flow = 0;
    const FAIL: Flow = 1;

    fn two_way(graph: &mut Graph) -> Region {
        let mut region = Region::new(graph, 2);
        let node = graph.create_node(2);
        region.connect(graph, NORMAL, node);
        region.attach_default_exits(graph, node);
        region
    }

    #[test]
    fn empty_region_is_pass_through() {
        let mut graph = Graph::new();
        let mut outer = Region::rooted(&graph, Graph::ENTRY, 2);
        let inner = Region::new(&mut graph, 2);
        let nodes_before = graph.num_nodes();
        outer.splice(&mut graph, NORMAL, inner);
        assert_eq!(graph.num_nodes(), nodes_before);
        outer.connect(&mut graph, NORMAL, Graph::EXIT);
        assert_eq!(graph.successor(Graph::ENTRY, 0), Some(Graph::EXIT));
    }

    #[test]
    fn splice_bypasses_private_head() {
        let mut graph = Graph::new();
        let mut outer = Region::rooted(&graph, Graph::ENTRY, 2);
        let inner = two_way(&mut graph);
        let inner_head = inner.head(&graph).unwrap();
        outer.splice(&mut graph, NORMAL, inner);

        assert_eq!(graph.successor(Graph::ENTRY, 0), Some(inner_head));
        let preds: Vec<_> = graph.predecessors(inner_head).collect();
        assert_eq!(preds, vec![Graph::ENTRY]);
        assert!(outer.has_flow(NORMAL));
        assert!(outer.has_flow(FAIL));
    }

    #[test]
    fn empty_region_can_redirect_flow() {
        let mut graph = Graph::new();
        let mut outer = Region::rooted(&graph, Graph::ENTRY, 2);
        let mut fail_now = Region::new(&mut graph, 2);
        fail_now.merge_flow_into(NORMAL, FAIL);
        outer.splice(&mut graph, NORMAL, fail_now);
        assert!(!outer.has_flow(NORMAL));
        assert_eq!(outer.flow_edges(FAIL), &[graph.exit_edge(Graph::ENTRY, 0)]);
    }

    #[test]
    fn swap_exchanges_groups() {
        let mut graph = Graph::new();
        let mut region = two_way(&mut graph);
        let normal = region.flow_edges(NORMAL).to_vec();
        let fail = region.flow_edges(FAIL).to_vec();
        region.swap(NORMAL, FAIL);
        assert_eq!(region.flow_edges(NORMAL), fail.as_slice());
        assert_eq!(region.flow_edges(FAIL), normal.as_slice());
    }

    #[test]
    fn attach_flow_collects_every_slot() {
        let mut graph = Graph::new();
        let mut region = Region::rooted(&graph, Graph::ENTRY, 2);
        let node = graph.create_node(2);
        region.connect(&mut graph, NORMAL, node);
        region.attach_flow(&graph, FAIL, node);
        assert!(!region.has_flow(NORMAL));
        assert_eq!(region.flow_edges(FAIL).len(), 2);
    }

    #[test]
    fn absorb_merges_arm_regions() {
        let mut graph = Graph::new();
        let mut region = Region::rooted(&graph, Graph::ENTRY, 2);
        let switch = graph.create_node(2);
        region.connect(&mut graph, NORMAL, switch);

        let then_arm = Region::from_edge(&graph, graph.exit_edge(switch, 0), 2);
        let mut else_arm = Region::from_edge(&graph, graph.exit_edge(switch, 1), 2);
        let work = graph.create_node(1);
        else_arm.connect(&mut graph, NORMAL, work);
        else_arm.attach_default_exits(&graph, work);

        region.absorb_exits(then_arm);
        region.absorb_exits(else_arm);
        region.connect(&mut graph, NORMAL, Graph::EXIT);

        let preds: Vec<_> = graph.predecessors(Graph::EXIT).collect();
        assert_eq!(preds, vec![switch, work]);
    }

    #[test]
    #[should_panic(expected = "splicing into empty flow group")]
    fn splicing_unreachable_flow_panics() {
        let mut graph = Graph::new();
        let mut region = Region::rooted(&graph, Graph::ENTRY, 2);
        let other = Region::new(&mut graph, 2);
        region.splice(&mut graph, FAIL, other);
    }

    #[test]
    #[should_panic(expected = "private entry node")]
    fn absorbing_private_region_panics() {
        let mut graph = Graph::new();
        let mut region = Region::rooted(&graph, Graph::ENTRY, 2);
        let other = Region::new(&mut graph, 2);
        region.absorb_exits(other);
    }
}
