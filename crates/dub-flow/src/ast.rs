// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Construct trees handed over by the frontend.
//!
//! Names are already resolved to declared parameters and locals; the lowering
//! only checks that every name it meets has been declared.

use crate::ops::{BinaryOp, Constant};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Any,
    Bool,
    Int,
    Str,
    List(Box<Type>),
    Struct(String),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Str => write!(f, "str"),
            Type::List(item) => write!(f, "[{}]", item),
            Type::Struct(name) => write!(f, "{}", name),
        }
    }
}

/// A named slot: parameter or local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub name: String,
    pub ty: Type,
}

impl Local {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Local {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Local>,
    pub locals: Vec<Local>,
    pub returns: Vec<Type>,
    pub body: Construct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Const(Constant),
    Var(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        raises: bool,
    },
    List(Vec<Expr>),
    Struct {
        name: String,
        fields: Vec<(String, Expr)>,
    },
    Attr {
        base: Box<Expr>,
        field: String,
    },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Const(Constant::Int(value))
    }

    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.to_string(),
            args,
            raises: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Construct {
    Sequence(Vec<Construct>),
    /// Ordered choice: the first alternative that succeeds wins, the cursor is
    /// restored before each further attempt.
    Choice(Vec<Construct>),
    /// At least `min` matches of `body`, then as many as possible.
    Repeat {
        body: Box<Construct>,
        min: usize,
    },
    Optional(Box<Construct>),
    /// Matches `body` without consuming input; `negate` inverts the outcome.
    Lookahead {
        body: Box<Construct>,
        negate: bool,
    },
    Literal(String),
    Read {
        dst: Option<String>,
    },
    Assign {
        name: String,
        value: Expr,
    },
    Eval(Expr),
    If {
        cond: Expr,
        then: Box<Construct>,
        otherwise: Box<Construct>,
    },
    Fail,
    Return(Vec<Expr>),
}

impl Construct {
    pub fn literal(text: &str) -> Self {
        Construct::Literal(text.to_string())
    }

    pub fn repeat(body: Construct, min: usize) -> Self {
        Construct::Repeat {
            body: Box::new(body),
            min,
        }
    }

    pub fn optional(body: Construct) -> Self {
        Construct::Optional(Box::new(body))
    }

    pub fn lookahead(body: Construct, negate: bool) -> Self {
        Construct::Lookahead {
            body: Box::new(body),
            negate,
        }
    }

    pub fn assign(name: &str, value: Expr) -> Self {
        Construct::Assign {
            name: name.to_string(),
            value,
        }
    }

    pub fn if_else(cond: Expr, then: Construct, otherwise: Construct) -> Self {
        Construct::If {
            cond,
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Calls an external function for its effect.
    pub fn emit(name: &str, args: Vec<Expr>) -> Self {
        Construct::Eval(Expr::call(name, args))
    }
}
