// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Per-function analysis bundle: dominators, frontiers, liveness and phis
//! with register def/use sets taken from the ops.

use crate::function::FlowFunction;
use dub_graph::{
    AlwaysLive, DominanceFrontiers, Dominators, Graph, Liveness, NodeId, PhiPlacement,
    ReversePostorder, VarId,
};
use log::debug;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct FunctionAnalysis {
    pub dominators: Dominators,
    pub frontiers: DominanceFrontiers,
    pub liveness: Liveness,
    pub phis: Option<PhiPlacement>,
}

/// Per-node register definitions and uses. Entry defines the parameters.
pub fn def_use_sets(func: &FlowFunction) -> (Vec<BTreeSet<VarId>>, Vec<BTreeSet<VarId>>) {
    let mut defs = vec![BTreeSet::new(); func.graph.num_nodes()];
    let mut uses = vec![BTreeSet::new(); func.graph.num_nodes()];
    defs[Graph::ENTRY.index()].extend(func.params().iter().map(|reg| reg.index()));
    for (node, op) in func.ops() {
        defs[node.index()].extend(op.defs().into_iter().map(|reg| reg.index()));
        uses[node.index()].extend(op.uses().into_iter().map(|reg| reg.index()));
    }
    (defs, uses)
}

impl FunctionAnalysis {
    pub fn compute(func: &FlowFunction, place_phis: bool, prune_by_liveness: bool) -> Self {
        let dominators = Dominators::compute(&func.graph);
        let frontiers = DominanceFrontiers::compute(&func.graph, &dominators);
        let (defs, uses) = def_use_sets(func);
        let liveness = Liveness::compute(&func.graph, dominators.order(), &defs, &uses);

        let phis = place_phis.then(|| {
            let mut def_sites = vec![BTreeSet::new(); func.num_registers()];
            for &node in dominators.order().order() {
                for &var in &defs[node.index()] {
                    def_sites[var].insert(node);
                }
            }
            if prune_by_liveness {
                PhiPlacement::compute(&func.graph, &frontiers, &def_sites, &liveness)
            } else {
                PhiPlacement::compute(&func.graph, &frontiers, &def_sites, &AlwaysLive)
            }
        });
        if let Some(phis) = &phis {
            debug!(
                "`{}`: {} phi nodes, {} use events",
                func.name,
                phis.phis().len(),
                phis.use_events().len()
            );
        }

        FunctionAnalysis {
            dominators,
            frontiers,
            liveness,
            phis,
        }
    }

    pub fn order(&self) -> &ReversePostorder {
        self.dominators.order()
    }

    /// Entries of `node` coming from reachable nodes earlier in the order.
    pub fn forward_entries(&self, graph: &Graph, node: NodeId) -> usize {
        let rpo = self.order();
        graph
            .predecessors(node)
            .filter(|&pred| rpo.contains(pred) && !rpo.is_back_edge(pred, node))
            .count()
    }

    /// A merge node has at least two forward entries.
    pub fn is_merge(&self, graph: &Graph, node: NodeId) -> bool {
        self.forward_entries(graph, node) >= 2
    }

    pub fn is_loop_header(&self, graph: &Graph, node: NodeId) -> bool {
        let rpo = self.order();
        graph
            .predecessors(node)
            .any(|pred| rpo.contains(pred) && rpo.is_back_edge(pred, node))
    }
}
