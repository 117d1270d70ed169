// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! The operations carried by flow graph nodes.

use dub_graph::Flow as FlowIndex;
use itertools::Itertools;
use std::fmt;

/// Handle of a register (parameter, local or temporary) of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegisterId(u32);

impl RegisterId {
    pub fn new(index: usize) -> Self {
        RegisterId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Kinds of control flow leaving a construct. Each kind is one exit group of a
/// [`dub_graph::Region`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Flow {
    Normal,
    Fail,
    Return,
    Exception,
}

impl Flow {
    pub const COUNT: usize = 4;
    pub const ALL: [Flow; Flow::COUNT] = [Flow::Normal, Flow::Fail, Flow::Return, Flow::Exception];

    pub fn index(self) -> FlowIndex {
        self as FlowIndex
    }

    pub fn name(self) -> &'static str {
        match self {
            Flow::Normal => "normal",
            Flow::Fail => "fail",
            Flow::Return => "return",
            Flow::Exception => "exception",
        }
    }
}

pub const NORMAL: FlowIndex = Flow::Normal as FlowIndex;
pub const FAIL: FlowIndex = Flow::Fail as FlowIndex;
pub const RETURN: FlowIndex = Flow::Return as FlowIndex;
pub const EXCEPTION: FlowIndex = Flow::Exception as FlowIndex;

/// Exit slots of a [`Op::Switch`].
pub const COND_TRUE: usize = 0;
pub const COND_FALSE: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => write!(f, "none"),
            Constant::Bool(value) => write!(f, "{}", value),
            Constant::Int(value) => write!(f, "{}", value),
            Constant::Str(value) => write!(f, "{:?}", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Const {
        dst: RegisterId,
        value: Constant,
    },
    Copy {
        dst: RegisterId,
        src: RegisterId,
    },
    Binary {
        dst: RegisterId,
        op: BinaryOp,
        lhs: RegisterId,
        rhs: RegisterId,
    },
    /// A call to an external function. A raising call has a second exit for
    /// the exception flow.
    Call {
        dst: Option<RegisterId>,
        name: String,
        args: Vec<RegisterId>,
        raises: bool,
    },
    ConstructList {
        dst: RegisterId,
        items: Vec<RegisterId>,
    },
    ConstructStruct {
        dst: RegisterId,
        name: String,
        fields: Vec<(String, RegisterId)>,
    },
    Attr {
        dst: RegisterId,
        base: RegisterId,
        field: String,
    },
    /// Saves the input cursor.
    Checkpoint {
        dst: RegisterId,
    },
    /// Restores the input cursor saved by a checkpoint.
    Recover {
        src: RegisterId,
    },
    /// Matches `text` at the cursor: exits normal on success, fail otherwise.
    Literal {
        text: String,
    },
    /// Consumes any one character: exits normal on success, fail at the end of
    /// the input.
    Read {
        dst: Option<RegisterId>,
    },
    Switch {
        cond: RegisterId,
    },
    SetReturn {
        values: Vec<RegisterId>,
    },
    /// Marks the function as failed.
    Failure,
}

impl Op {
    /// Number of exit slots of a node carrying this op.
    pub fn arity(&self) -> usize {
        match self {
            Op::Call { raises: true, .. }
            | Op::Literal { .. }
            | Op::Read { .. }
            | Op::Switch { .. } => 2,
            _ => 1,
        }
    }

    /// The flow kind of an exit slot, or `None` for the two arms of a switch.
    pub fn exit_flow(&self, slot: usize) -> Option<Flow> {
        match (self, slot) {
            (Op::Switch { .. }, _) => None,
            (Op::SetReturn { .. }, 0) => Some(Flow::Return),
            (_, 0) => Some(Flow::Normal),
            (Op::Call { .. }, 1) => Some(Flow::Exception),
            (Op::Literal { .. } | Op::Read { .. }, 1) => Some(Flow::Fail),
            _ => panic!("slot {} exceeds the arity of `{}`", slot, self),
        }
    }

    pub fn exit_label(&self, slot: usize) -> &'static str {
        match self.exit_flow(slot) {
            Some(flow) => flow.name(),
            None if slot == COND_TRUE => "true",
            None => "false",
        }
    }

    /// Registers written by the op.
    pub fn defs(&self) -> Vec<RegisterId> {
        match self {
            Op::Const { dst, .. }
            | Op::Copy { dst, .. }
            | Op::Binary { dst, .. }
            | Op::ConstructList { dst, .. }
            | Op::ConstructStruct { dst, .. }
            | Op::Attr { dst, .. }
            | Op::Checkpoint { dst } => vec![*dst],
            Op::Call { dst, .. } | Op::Read { dst } => dst.iter().copied().collect(),
            Op::Recover { .. }
            | Op::Literal { .. }
            | Op::Switch { .. }
            | Op::SetReturn { .. }
            | Op::Failure => vec![],
        }
    }

    /// Registers read by the op.
    pub fn uses(&self) -> Vec<RegisterId> {
        match self {
            Op::Copy { src, .. } | Op::Recover { src } => vec![*src],
            Op::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Op::Call { args, .. } => args.clone(),
            Op::ConstructList { items, .. } => items.clone(),
            Op::ConstructStruct { fields, .. } => fields.iter().map(|(_, reg)| *reg).collect(),
            Op::Attr { base, .. } => vec![*base],
            Op::Switch { cond } => vec![*cond],
            Op::SetReturn { values } => values.clone(),
            Op::Const { .. }
            | Op::Checkpoint { .. }
            | Op::Literal { .. }
            | Op::Read { .. }
            | Op::Failure => vec![],
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Const { dst, value } => write!(f, "{} = {}", dst, value),
            Op::Copy { dst, src } => write!(f, "{} = {}", dst, src),
            Op::Binary { dst, op, lhs, rhs } => write!(f, "{} = {} {} {}", dst, lhs, op, rhs),
            Op::Call {
                dst,
                name,
                args,
                raises,
            } => {
                if let Some(dst) = dst {
                    write!(f, "{} = ", dst)?;
                }
                write!(f, "{}({})", name, args.iter().join(", "))?;
                if *raises {
                    write!(f, "?")?;
                }
                Ok(())
            }
            Op::ConstructList { dst, items } => {
                write!(f, "{} = [{}]", dst, items.iter().join(", "))
            }
            Op::ConstructStruct { dst, name, fields } => write!(
                f,
                "{} = {} {{ {} }}",
                dst,
                name,
                fields
                    .iter()
                    .map(|(field, reg)| format!("{}: {}", field, reg))
                    .join(", ")
            ),
            Op::Attr { dst, base, field } => write!(f, "{} = {}.{}", dst, base, field),
            Op::Checkpoint { dst } => write!(f, "{} = checkpoint", dst),
            Op::Recover { src } => write!(f, "recover {}", src),
            Op::Literal { text } => write!(f, "literal {:?}", text),
            Op::Read { dst: Some(dst) } => write!(f, "{} = read", dst),
            Op::Read { dst: None } => write!(f, "read"),
            Op::Switch { cond } => write!(f, "switch {}", cond),
            Op::SetReturn { values } => write!(f, "set_return {}", values.iter().join(", ")),
            Op::Failure => write!(f, "failure"),
        }
    }
}
