// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Backward liveness over per-node def/use sets.

use crate::dominance::ReversePostorder;
use crate::graph::{Graph, NodeId};
use log::debug;
use std::collections::{BTreeSet, VecDeque};

/// Dense index of a tracked variable.
pub type VarId = usize;

/// Answers whether a variable is live around a node.
pub trait LivenessOracle {
    fn live_at_entry(&self, node: NodeId, var: VarId) -> bool;
    fn live_at_exit(&self, node: NodeId, var: VarId) -> bool;
}

/// The conservative oracle: every variable is live everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysLive;

impl LivenessOracle for AlwaysLive {
    fn live_at_entry(&self, _node: NodeId, _var: VarId) -> bool {
        true
    }

    fn live_at_exit(&self, _node: NodeId, _var: VarId) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct Liveness {
    live_in: Vec<BTreeSet<VarId>>,
    live_out: Vec<BTreeSet<VarId>>,
    visits: usize,
}

impl Liveness {
    /// Runs the fixed point. `defs` and `uses` are indexed by node.
    ///
    /// Every node is visited once from the seed, and again only when the
    /// live-in set of one of its successors grows. A live-in set grows at most
    /// once per variable, so the visits are bounded by
    /// `nodes + vars * edges`; with at most two exits per node that is
    /// `nodes * (2 * vars + 1)`.
    pub fn compute(
        graph: &Graph,
        rpo: &ReversePostorder,
        defs: &[BTreeSet<VarId>],
        uses: &[BTreeSet<VarId>],
    ) -> Self {
        assert_eq!(defs.len(), graph.num_nodes(), "one def set per node");
        assert_eq!(uses.len(), graph.num_nodes(), "one use set per node");

        let mut live_in = vec![BTreeSet::new(); graph.num_nodes()];
        let mut live_out = vec![BTreeSet::new(); graph.num_nodes()];
        let mut queued = vec![false; graph.num_nodes()];
        let mut worklist: VecDeque<NodeId> = rpo.order().iter().rev().copied().collect();
        for node in &worklist {
            queued[node.index()] = true;
        }

        let mut visits = 0;
        while let Some(node) = worklist.pop_front() {
            queued[node.index()] = false;
            visits += 1;

            let out: BTreeSet<VarId> = graph
                .successors(node)
                .flat_map(|succ| live_in[succ.index()].iter().copied())
                .collect();
            let mut entry: BTreeSet<VarId> = out.difference(&defs[node.index()]).copied().collect();
            entry.extend(uses[node.index()].iter().copied());

            debug_assert!(out.is_superset(&live_out[node.index()]), "live-out shrank at {}", node);
            debug_assert!(entry.is_superset(&live_in[node.index()]), "live-in shrank at {}", node);
            live_out[node.index()] = out;

            if entry.len() == live_in[node.index()].len() {
                continue;
            }
            live_in[node.index()] = entry;
            for pred in graph.predecessors(node) {
                if rpo.contains(pred) && !queued[pred.index()] {
                    queued[pred.index()] = true;
                    worklist.push_back(pred);
                }
            }
        }
        debug!("liveness converged after {} node visits", visits);

        Liveness {
            live_in,
            live_out,
            visits,
        }
    }

    pub fn live_in(&self, node: NodeId) -> &BTreeSet<VarId> {
        &self.live_in[node.index()]
    }

    pub fn live_out(&self, node: NodeId) -> &BTreeSet<VarId> {
        &self.live_out[node.index()]
    }

    /// Number of node visits the fixed point took.
    pub fn visits(&self) -> usize {
        self.visits
    }
}

impl LivenessOracle for Liveness {
    fn live_at_entry(&self, node: NodeId, var: VarId) -> bool {
        self.live_in[node.index()].contains(&var)
    }

    fn live_at_exit(&self, node: NodeId, var: VarId) -> bool {
        self.live_out[node.index()].contains(&var)
    }
}
