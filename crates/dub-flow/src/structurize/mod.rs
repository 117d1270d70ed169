// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Rebuilding nested statements from a flow graph.
//!
//! - [`ClusterStructurizer`] nests blocks and loops along the dominator tree
//!   and needs a reducible graph.
//! - [`LabelStructurizer`] emits one labelled statement per join point and
//!   connects them with gotos; it accepts any graph.

mod cluster;
mod retree;

pub use cluster::{ClusterStructurizer, IrreducibleGraph};
pub use retree::LabelStructurizer;

use crate::analysis::FunctionAnalysis;
use crate::function::FlowFunction;
use crate::ops::{Flow, Op};
use crate::structured::{Condition, StructuredFunction};
use anyhow::{bail, Result};
use dub_graph::{Graph, NodeId};

/// A strategy turning a flow function into a statement tree.
pub trait Structurizer {
    /// Returns a name for this structurizer, for logs and dumps.
    fn name(&self) -> &'static str;

    fn structurize(
        &self,
        func: &FlowFunction,
        analysis: &FunctionAnalysis,
    ) -> Result<StructuredFunction>;
}

/// Rejects graphs with flows no structurizer can express yet.
pub(crate) fn check_supported(func: &FlowFunction, analysis: &FunctionAnalysis) -> Result<()> {
    for &node in analysis.order().order() {
        if node == Graph::EXIT {
            continue;
        }
        successors(func, node)?;
        if let Some(op) = func.op(node) {
            for slot in 0..op.arity() {
                if op.exit_flow(slot) == Some(Flow::Exception) {
                    bail!(
                        "exception flow out of `{}` at {} in `{}`: not supported yet",
                        op,
                        node,
                        func.name
                    );
                }
            }
        }
    }
    Ok(())
}

/// Destinations of every exit slot of `node`.
pub(crate) fn successors(func: &FlowFunction, node: NodeId) -> Result<Vec<NodeId>> {
    func.graph
        .exits(node)
        .enumerate()
        .map(|(slot, (_, dst))| match dst {
            Some(dst) => Ok(dst),
            None => bail!(
                "exit slot {} of {} in `{}` is not attached: not supported yet",
                slot,
                node,
                func.name
            ),
        })
        .collect()
}

/// The condition deciding between the two exits of `node`.
pub(crate) fn condition(func: &FlowFunction, node: NodeId) -> Result<Condition> {
    match func.op(node) {
        Some(Op::Switch { cond }) => Ok(Condition::Register(*cond)),
        Some(op @ (Op::Literal { .. } | Op::Read { .. })) => Ok(Condition::Matches(op.clone())),
        Some(op) => bail!("two-way `{}` at {}: not supported yet", op, node),
        None => bail!("two-way node {} without an op: not supported yet", node),
    }
}
