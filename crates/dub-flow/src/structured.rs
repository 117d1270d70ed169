// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Structured statement trees handed to code emitters.

use crate::function::{FlowFunction, RegisterInfo};
use crate::ops::{Op, RegisterId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelId(u32);

impl LabelId {
    pub fn new(index: usize) -> Self {
        LabelId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The register holds `true`.
    Register(RegisterId),
    /// Runs a matching op (literal or read) and tests whether it succeeded.
    Matches(Op),
    Not(Box<Condition>),
}

impl Condition {
    pub fn negate(self) -> Self {
        match self {
            Condition::Not(inner) => *inner,
            other => Condition::Not(Box::new(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Op(Op),
    Assign {
        dst: RegisterId,
        src: RegisterId,
    },
    If {
        cond: Condition,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    /// `break label` leaves the block.
    Block {
        label: LabelId,
        body: Vec<Stmt>,
    },
    /// `continue label` restarts the loop, `break label` leaves it.
    Loop {
        label: LabelId,
        body: Vec<Stmt>,
    },
    /// Target of `goto label` within the enclosing statement list. Control
    /// falls through from one labelled statement into the next.
    Labeled {
        label: LabelId,
        body: Vec<Stmt>,
    },
    Goto(LabelId),
    Break(LabelId),
    Continue(LabelId),
    /// Leaves the function.
    Return,
}

impl Stmt {
    pub fn from_op(op: &Op) -> Self {
        match op {
            Op::Copy { dst, src } => Stmt::Assign {
                dst: *dst,
                src: *src,
            },
            other => Stmt::Op(other.clone()),
        }
    }

    /// Whether control never continues past this statement.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Stmt::Goto(_) | Stmt::Break(_) | Stmt::Continue(_) | Stmt::Return
        )
    }

    /// Number of leaf statements (ops, assignments and conditions) in this
    /// statement, counting nested ones.
    pub fn num_leaves(&self) -> usize {
        match self {
            Stmt::Op(_) | Stmt::Assign { .. } => 1,
            Stmt::If {
                then, otherwise, ..
            } => 1 + count_leaves(then) + count_leaves(otherwise),
            Stmt::Block { body, .. } | Stmt::Loop { body, .. } | Stmt::Labeled { body, .. } => {
                count_leaves(body)
            }
            Stmt::Goto(_) | Stmt::Break(_) | Stmt::Continue(_) | Stmt::Return => 0,
        }
    }
}

pub fn count_leaves(stmts: &[Stmt]) -> usize {
    stmts.iter().map(Stmt::num_leaves).sum()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredFunction {
    pub name: String,
    pub registers: Vec<RegisterInfo>,
    pub params: Vec<RegisterId>,
    pub body: Vec<Stmt>,
}

impl StructuredFunction {
    pub fn new(func: &FlowFunction, body: Vec<Stmt>) -> Self {
        StructuredFunction {
            name: func.name.clone(),
            registers: func.registers().to_vec(),
            params: func.params().to_vec(),
            body,
        }
    }
}
