// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

use crate::ast::Type;
use crate::ops::{Op, RegisterId};
use dub_graph::{Graph, NodeId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    pub name: String,
    pub ty: Type,
}

/// A function body as a flow graph. Every node except the Entry and Exit
/// sentinels carries exactly one op.
#[derive(Debug, Clone)]
pub struct FlowFunction {
    pub name: String,
    pub graph: Graph,
    ops: BTreeMap<NodeId, Op>,
    registers: Vec<RegisterInfo>,
    params: Vec<RegisterId>,
    returns: Vec<Type>,
}

impl FlowFunction {
    pub fn new(name: impl Into<String>) -> Self {
        FlowFunction {
            name: name.into(),
            graph: Graph::new(),
            ops: BTreeMap::new(),
            registers: Vec::new(),
            params: Vec::new(),
            returns: Vec::new(),
        }
    }

    pub fn new_register(&mut self, name: impl Into<String>, ty: Type) -> RegisterId {
        let id = RegisterId::new(self.registers.len());
        self.registers.push(RegisterInfo {
            name: name.into(),
            ty,
        });
        id
    }

    pub fn new_param(&mut self, name: impl Into<String>, ty: Type) -> RegisterId {
        let id = self.new_register(name, ty);
        self.params.push(id);
        id
    }

    pub fn set_returns(&mut self, returns: Vec<Type>) {
        self.returns = returns;
    }

    /// Allocates a node for `op` with one dangling exit per slot.
    pub fn add_op(&mut self, op: Op) -> NodeId {
        let node = self.graph.create_node(op.arity());
        self.ops.insert(node, op);
        node
    }

    pub fn op(&self, node: NodeId) -> Option<&Op> {
        self.ops.get(&node)
    }

    pub fn ops(&self) -> impl Iterator<Item = (NodeId, &Op)> {
        self.ops.iter().map(|(node, op)| (*node, op))
    }

    pub fn register(&self, id: RegisterId) -> &RegisterInfo {
        &self.registers[id.index()]
    }

    pub fn registers(&self) -> &[RegisterInfo] {
        &self.registers
    }

    pub fn num_registers(&self) -> usize {
        self.registers.len()
    }

    pub fn params(&self) -> &[RegisterId] {
        &self.params
    }

    pub fn returns(&self) -> &[Type] {
        &self.returns
    }
}
