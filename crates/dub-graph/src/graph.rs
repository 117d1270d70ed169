// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Append-only graph store.
//!
//! Nodes and edges live in two arenas and are addressed by dense integer
//! handles. A node declares its number of exit slots when it is created and
//! owns one edge per slot; an edge stays dangling until it is attached to a
//! destination. Nothing is ever removed: code that becomes unreachable stays in
//! the arena without entries.

use std::fmt;

/// Handle of a node in a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Handle of an edge in a [`Graph`]. Every edge belongs to one exit slot of
/// its source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(u32);

impl EdgeId {
    pub fn new(index: usize) -> Self {
        EdgeId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    entries: Vec<EdgeId>,
    exits: Vec<EdgeId>,
}

#[derive(Debug, Clone)]
struct EdgeData {
    src: NodeId,
    slot: usize,
    dst: Option<NodeId>,
}

/// The graph of a single function body.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<NodeData>,
    edges: Vec<EdgeData>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// The entry sentinel: one exit, never any entries.
    pub const ENTRY: NodeId = NodeId(0);
    /// The exit sentinel: no exits.
    pub const EXIT: NodeId = NodeId(1);

    pub fn new() -> Self {
        let mut graph = Graph {
            nodes: Vec::new(),
            edges: Vec::new(),
        };
        graph.create_node(1);
        graph.create_node(0);
        graph
    }

    pub fn entry(&self) -> NodeId {
        Self::ENTRY
    }

    pub fn exit(&self) -> NodeId {
        Self::EXIT
    }

    /// Allocates a node with `arity` dangling exit edges.
    pub fn create_node(&mut self, arity: usize) -> NodeId {
        let node = NodeId::new(self.nodes.len());
        let mut exits = Vec::with_capacity(arity);
        for slot in 0..arity {
            exits.push(EdgeId::new(self.edges.len()));
            self.edges.push(EdgeData {
                src: node,
                slot,
                dst: None,
            });
        }
        self.nodes.push(NodeData {
            entries: Vec::new(),
            exits,
        });
        node
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + Clone {
        (0..self.nodes.len()).map(NodeId::new)
    }

    pub fn num_entries(&self, node: NodeId) -> usize {
        self.nodes[node.index()].entries.len()
    }

    pub fn num_exits(&self, node: NodeId) -> usize {
        self.nodes[node.index()].exits.len()
    }

    /// The edge owned by exit `slot` of `node`.
    pub fn exit_edge(&self, node: NodeId, slot: usize) -> EdgeId {
        let exits = &self.nodes[node.index()].exits;
        assert!(
            slot < exits.len(),
            "slot {} exceeds the declared arity {} of {}",
            slot,
            exits.len(),
            node
        );
        exits[slot]
    }

    pub fn edge_src(&self, edge: EdgeId) -> NodeId {
        self.edges[edge.index()].src
    }

    pub fn edge_slot(&self, edge: EdgeId) -> usize {
        self.edges[edge.index()].slot
    }

    pub fn edge_dst(&self, edge: EdgeId) -> Option<NodeId> {
        self.edges[edge.index()].dst
    }

    /// The destination of exit `slot` of `node`, if attached.
    pub fn successor(&self, node: NodeId, slot: usize) -> Option<NodeId> {
        self.edge_dst(self.exit_edge(node, slot))
    }

    /// Attaches exit `slot` of `src` to `dst`.
    pub fn connect(&mut self, src: NodeId, slot: usize, dst: NodeId) {
        let edge = self.exit_edge(src, slot);
        self.attach(edge, dst);
    }

    /// Attaches a dangling edge to `dst`, appending it to `dst`'s entries.
    pub fn attach(&mut self, edge: EdgeId, dst: NodeId) {
        let data = &mut self.edges[edge.index()];
        if let Some(existing) = data.dst {
            panic!(
                "{} ({} slot {}) is already attached to {}",
                edge, data.src, data.slot, existing
            );
        }
        data.dst = Some(dst);
        self.nodes[dst.index()].entries.push(edge);
    }

    /// Hands the destination of `edge` over to `replacements`.
    ///
    /// `edge` becomes dangling again and the replacement edges, which must all
    /// be dangling, take its place in the destination's entry list, keeping
    /// the relative order of the other entries.
    pub fn replace_edge_with_multiple(&mut self, edge: EdgeId, replacements: &[EdgeId]) {
        let dst = self.edges[edge.index()]
            .dst
            .take()
            .unwrap_or_else(|| panic!("{} has no destination to hand over", edge));
        for &replacement in replacements {
            let data = &mut self.edges[replacement.index()];
            assert!(
                data.dst.is_none(),
                "replacement {} is already attached to {:?}",
                replacement,
                data.dst
            );
            data.dst = Some(dst);
        }
        let entries = &mut self.nodes[dst.index()].entries;
        let position = entries
            .iter()
            .position(|entry| *entry == edge)
            .expect("attached edge must be listed in its destination's entries");
        entries.splice(position..=position, replacements.iter().copied());
    }

    /// Incoming edges of `node` with their source nodes, in attachment order.
    pub fn entries(&self, node: NodeId) -> Entries<'_> {
        Entries {
            graph: self,
            edges: self.nodes[node.index()].entries.iter(),
        }
    }

    /// Outgoing edges of `node` in slot order, with their destination if
    /// attached.
    pub fn exits(&self, node: NodeId) -> Exits<'_> {
        Exits {
            graph: self,
            edges: self.nodes[node.index()].exits.iter(),
        }
    }

    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + Clone + '_ {
        self.exits(node).filter_map(|(_, dst)| dst)
    }

    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + Clone + '_ {
        self.entries(node).map(|(_, src)| src)
    }
}

/// Iterator over the entries of a node. Cloning it restarts from the current
/// position, so it can be walked any number of times.
#[derive(Clone)]
pub struct Entries<'g> {
    graph: &'g Graph,
    edges: std::slice::Iter<'g, EdgeId>,
}

impl Iterator for Entries<'_> {
    type Item = (EdgeId, NodeId);

    fn next(&mut self) -> Option<Self::Item> {
        let edge = *self.edges.next()?;
        Some((edge, self.graph.edge_src(edge)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.edges.size_hint()
    }
}

impl ExactSizeIterator for Entries<'_> {}

/// Iterator over the exits of a node.
#[derive(Clone)]
pub struct Exits<'g> {
    graph: &'g Graph,
    edges: std::slice::Iter<'g, EdgeId>,
}

impl Iterator for Exits<'_> {
    type Item = (EdgeId, Option<NodeId>);

    fn next(&mut self) -> Option<Self::Item> {
        let edge = *self.edges.next()?;
        Some((edge, self.graph.edge_dst(edge)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.edges.size_hint()
    }
}

impl ExactSizeIterator for Exits<'_> {}
