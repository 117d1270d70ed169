// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Phi placement for static single information form.
//!
//! Phis go on the iterated dominance frontier of each variable's definition
//! sites, pruned by a [`LivenessOracle`]. Every placed phi also records a use
//! of the variable at each predecessor of the phi node; sigma placement on
//! the use side would consume these.

use crate::dominance::DominanceFrontiers;
use crate::graph::{Graph, NodeId};
use crate::liveness::{LivenessOracle, VarId};
use log::trace;
use std::collections::{BTreeMap, BTreeSet};

/// A use of `var` at the end of `node`, feeding the phi placed at `phi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UseEvent {
    pub node: NodeId,
    pub phi: NodeId,
    pub var: VarId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhiPlacement {
    phis: BTreeMap<NodeId, BTreeSet<VarId>>,
    use_events: Vec<UseEvent>,
}

impl PhiPlacement {
    /// Places phis for every variable. `def_sites[var]` lists the nodes
    /// defining `var`.
    pub fn compute(
        graph: &Graph,
        frontiers: &DominanceFrontiers,
        def_sites: &[BTreeSet<NodeId>],
        oracle: &impl LivenessOracle,
    ) -> Self {
        let mut placement = PhiPlacement::default();
        for (var, sites) in def_sites.iter().enumerate() {
            placement.place_variable(graph, frontiers, var, sites, oracle);
        }
        placement
    }

    fn place_variable(
        &mut self,
        graph: &Graph,
        frontiers: &DominanceFrontiers,
        var: VarId,
        sites: &BTreeSet<NodeId>,
        oracle: &impl LivenessOracle,
    ) {
        let mut enqueued: BTreeSet<NodeId> = sites.clone();
        let mut stack: Vec<NodeId> = sites.iter().copied().collect();
        while let Some(def) = stack.pop() {
            for &join in frontiers.frontier(def) {
                if self.needs_phi(join, var) || !oracle.live_at_entry(join, var) {
                    continue;
                }
                trace!("phi for v{} at {} (frontier of {})", var, join, def);
                self.phis.entry(join).or_default().insert(var);
                for pred in graph.predecessors(join) {
                    self.use_events.push(UseEvent {
                        node: pred,
                        phi: join,
                        var,
                    });
                }
                if enqueued.insert(join) {
                    stack.push(join);
                }
            }
        }
    }

    pub fn needs_phi(&self, node: NodeId, var: VarId) -> bool {
        self.phis.get(&node).map_or(false, |vars| vars.contains(&var))
    }

    /// Variables with a phi at `node`, in ascending order.
    pub fn phi_variables(&self, node: NodeId) -> impl Iterator<Item = VarId> + '_ {
        self.phis.get(&node).into_iter().flatten().copied()
    }

    pub fn phis(&self) -> &BTreeMap<NodeId, BTreeSet<VarId>> {
        &self.phis
    }

    pub fn use_events(&self) -> &[UseEvent] {
        &self.use_events
    }

    pub fn is_empty(&self) -> bool {
        self.phis.is_empty()
    }
}
