// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Structurizing with labels and gotos.
//!
//! Heads are Entry and every node entered more than once, except Exit. Each
//! head starts a labelled statement holding the straight-line walk from it;
//! the walk inlines nodes entered once and jumps to heads with `goto`. Of the
//! two arms of a branch, the one reaching a later head falls through and the
//! other is nested in an `if` that jumps away.

use super::{check_supported, condition, successors, Structurizer};
use crate::analysis::FunctionAnalysis;
use crate::function::FlowFunction;
use crate::structured::{LabelId, Stmt, StructuredFunction};
use anyhow::{bail, Result};
use dub_graph::{Graph, NodeId, ReversePostorder};
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct LabelStructurizer;

impl Structurizer for LabelStructurizer {
    fn name(&self) -> &'static str {
        "retree"
    }

    fn structurize(
        &self,
        func: &FlowFunction,
        analysis: &FunctionAnalysis,
    ) -> Result<StructuredFunction> {
        check_supported(func, analysis)?;

        let heads: Vec<NodeId> = analysis
            .order()
            .order()
            .iter()
            .copied()
            .filter(|&node| {
                node == Graph::ENTRY || (node != Graph::EXIT && func.graph.num_entries(node) >= 2)
            })
            .collect();
        let labels: BTreeMap<NodeId, LabelId> = heads
            .iter()
            .enumerate()
            .map(|(index, &head)| (head, LabelId::new(index)))
            .collect();
        debug!("`{}`: {} labelled heads", func.name, heads.len());

        let retree = Retree {
            func,
            order: analysis.order(),
            labels,
        };
        let mut blocks = heads
            .iter()
            .map(|&head| -> Result<(LabelId, Vec<Stmt>)> {
                Ok((retree.labels[&head], retree.walk(head)?))
            })
            .collect::<Result<Vec<_>>>()?;

        // a jump to the next block is a fall-through
        for index in 1..blocks.len() {
            let next = blocks[index].0;
            let body = &mut blocks[index - 1].1;
            if body.last() == Some(&Stmt::Goto(next)) {
                body.pop();
            }
        }

        let body = blocks
            .into_iter()
            .map(|(label, body)| Stmt::Labeled { label, body })
            .collect();
        Ok(StructuredFunction::new(func, body))
    }
}

struct Retree<'a> {
    func: &'a FlowFunction,
    order: &'a ReversePostorder,
    labels: BTreeMap<NodeId, LabelId>,
}

impl Retree<'_> {
    /// Straight-line code from `start` up to the first jump.
    fn walk(&self, start: NodeId) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        let mut node = start;
        loop {
            if node == Graph::EXIT {
                stmts.push(Stmt::Return);
                return Ok(stmts);
            }
            match successors(self.func, node)?.as_slice() {
                [next] => {
                    stmts.extend(self.func.op(node).map(Stmt::from_op));
                    if let Some(&label) = self.labels.get(next) {
                        stmts.push(Stmt::Goto(label));
                        return Ok(stmts);
                    }
                    node = *next;
                }
                [then, otherwise] => {
                    let cond = condition(self.func, node)?;
                    let then_arm = self.arm(*then)?;
                    let otherwise_arm = self.arm(*otherwise)?;
                    let (cond, jumping, falling) = if self.reach(*then) > self.reach(*otherwise) {
                        (cond.negate(), otherwise_arm, then_arm)
                    } else {
                        (cond, then_arm, otherwise_arm)
                    };
                    if ends_in_jump(&jumping) {
                        stmts.push(Stmt::If {
                            cond,
                            then: jumping,
                            otherwise: vec![],
                        });
                        stmts.extend(falling);
                    } else {
                        stmts.push(Stmt::If {
                            cond,
                            then: jumping,
                            otherwise: falling,
                        });
                    }
                    return Ok(stmts);
                }
                other => bail!("{} with {} exits: not supported yet", node, other.len()),
            }
        }
    }

    fn arm(&self, node: NodeId) -> Result<Vec<Stmt>> {
        match self.labels.get(&node) {
            Some(&label) => Ok(vec![Stmt::Goto(label)]),
            None => self.walk(node),
        }
    }

    /// Order index of the first head or Exit met from `node` along slot 0.
    fn reach(&self, mut node: NodeId) -> usize {
        while node != Graph::EXIT && !self.labels.contains_key(&node) {
            match self.func.graph.successor(node, 0) {
                Some(next) => node = next,
                None => return usize::MAX,
            }
        }
        self.order.index(node).unwrap_or(usize::MAX)
    }
}

/// Whether control never runs past the end of `stmts`.
fn ends_in_jump(stmts: &[Stmt]) -> bool {
    match stmts.last() {
        Some(Stmt::If { then, otherwise, .. }) => ends_in_jump(then) && ends_in_jump(otherwise),
        Some(stmt) => stmt.is_jump(),
        None => false,
    }
}
