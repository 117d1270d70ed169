// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Structurizing along the dominator tree.
//!
//! Each node owns the code of the nodes it immediately dominates. Dominator
//! tree children with several forward entries ("merge nodes") follow the
//! node's own code, each one after a labelled block that the edges into it
//! break out of; the merge node latest in reverse postorder gets the outermost
//! block. Every other child has a single forward entry and is inlined at that
//! edge. A node entered through a back edge wraps all of this in a labelled
//! loop, and back edges become `continue`.

use super::{check_supported, condition, successors, Structurizer};
use crate::analysis::FunctionAnalysis;
use crate::function::FlowFunction;
use crate::structured::{LabelId, Stmt, StructuredFunction};
use anyhow::Result;
use dub_graph::{Graph, NodeId};
use log::debug;
use std::fmt;

/// A back edge whose target does not dominate its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrreducibleGraph {
    pub src: NodeId,
    pub dst: NodeId,
}

impl fmt::Display for IrreducibleGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "irreducible control flow: back edge {} -> {} does not target a dominator",
            self.src, self.dst
        )
    }
}

impl std::error::Error for IrreducibleGraph {}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterStructurizer;

impl Structurizer for ClusterStructurizer {
    fn name(&self) -> &'static str {
        "cluster"
    }

    fn structurize(
        &self,
        func: &FlowFunction,
        analysis: &FunctionAnalysis,
    ) -> Result<StructuredFunction> {
        check_reducible(func, analysis)?;
        check_supported(func, analysis)?;
        let cluster = Cluster { func, analysis };
        let body = cluster.do_tree(Graph::ENTRY)?;
        Ok(StructuredFunction::new(func, body))
    }
}

fn check_reducible(func: &FlowFunction, analysis: &FunctionAnalysis) -> Result<()> {
    let rpo = analysis.order();
    for &node in rpo.order() {
        for succ in func.graph.successors(node) {
            if rpo.is_back_edge(node, succ) && !analysis.dominators.dominates(succ, node) {
                debug!("`{}` is irreducible at {} -> {}", func.name, node, succ);
                return Err(IrreducibleGraph { src: node, dst: succ }.into());
            }
        }
    }
    Ok(())
}

struct Cluster<'a> {
    func: &'a FlowFunction,
    analysis: &'a FunctionAnalysis,
}

impl Cluster<'_> {
    fn label(node: NodeId) -> LabelId {
        LabelId::new(node.index())
    }

    /// Code for `node` and everything it dominates.
    fn do_tree(&self, node: NodeId) -> Result<Vec<Stmt>> {
        let graph = &self.func.graph;
        let merges: Vec<NodeId> = self
            .analysis
            .dominators
            .children(node)
            .iter()
            .copied()
            .filter(|&child| self.analysis.is_merge(graph, child))
            .collect();
        let body = self.node_within(node, &merges)?;
        if self.analysis.is_loop_header(graph, node) {
            Ok(vec![Stmt::Loop {
                label: Self::label(node),
                body,
            }])
        } else {
            Ok(body)
        }
    }

    /// `merges` is sorted in reverse postorder; the last one is outermost.
    fn node_within(&self, node: NodeId, merges: &[NodeId]) -> Result<Vec<Stmt>> {
        match merges.split_last() {
            None => self.code_for(node),
            Some((&merge, inner)) => {
                let mut stmts = vec![Stmt::Block {
                    label: Self::label(merge),
                    body: self.node_within(node, inner)?,
                }];
                stmts.extend(self.do_tree(merge)?);
                Ok(stmts)
            }
        }
    }

    fn code_for(&self, node: NodeId) -> Result<Vec<Stmt>> {
        if node == Graph::EXIT {
            return Ok(vec![Stmt::Return]);
        }
        match successors(self.func, node)?.as_slice() {
            [next] => {
                let mut stmts: Vec<Stmt> =
                    self.func.op(node).map(Stmt::from_op).into_iter().collect();
                stmts.extend(self.do_branch(node, *next)?);
                Ok(stmts)
            }
            [then, otherwise] => Ok(vec![Stmt::If {
                cond: condition(self.func, node)?,
                then: self.do_branch(node, *then)?,
                otherwise: self.do_branch(node, *otherwise)?,
            }]),
            other => anyhow::bail!("{} with {} exits: not supported yet", node, other.len()),
        }
    }

    fn do_branch(&self, src: NodeId, dst: NodeId) -> Result<Vec<Stmt>> {
        let graph = &self.func.graph;
        if self.analysis.order().is_back_edge(src, dst) {
            Ok(vec![Stmt::Continue(Self::label(dst))])
        } else if self.analysis.is_merge(graph, dst) {
            Ok(vec![Stmt::Break(Self::label(dst))])
        } else {
            self.do_tree(dst)
        }
    }
}
