// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Human-readable dumps of flow functions and statement trees.

use crate::function::FlowFunction;
use crate::structured::{Condition, Stmt, StructuredFunction};
use dub_graph::{Graph, ReversePostorder};
use itertools::Itertools;
use std::fmt::{self, Write};

/// Renders the reachable part of `func` as a Graphviz digraph.
pub fn cfg_to_dot(func: &FlowFunction) -> String {
    let rpo = ReversePostorder::compute(&func.graph);
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = writeln!(out, "digraph {:?} {{", func.name);
    for &node in rpo.order() {
        let label = match func.op(node) {
            Some(op) => op.to_string(),
            None if node == Graph::ENTRY => "entry".to_string(),
            None if node == Graph::EXIT => "exit".to_string(),
            None => node.to_string(),
        };
        let _ = writeln!(out, "    {} [label={:?}];", node, label);
    }
    for &node in rpo.order() {
        for (slot, (_, dst)) in func.graph.exits(node).enumerate() {
            let Some(dst) = dst else { continue };
            let label = func.op(node).map_or("normal", |op| op.exit_label(slot));
            let _ = writeln!(out, "    {} -> {} [label={:?}];", node, dst, label);
        }
    }
    out.push_str("}\n");
    out
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Register(reg) => write!(f, "{}", reg),
            Condition::Matches(op) => write!(f, "{}", op),
            Condition::Not(inner) => match inner.as_ref() {
                Condition::Register(reg) => write!(f, "!{}", reg),
                other => write!(f, "!({})", other),
            },
        }
    }
}

fn write_stmts(f: &mut fmt::Formatter<'_>, stmts: &[Stmt], depth: usize) -> fmt::Result {
    for stmt in stmts {
        write_stmt(f, stmt, depth)?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    let indent = "    ".repeat(depth);
    match stmt {
        Stmt::Op(op) => writeln!(f, "{}{};", indent, op),
        Stmt::Assign { dst, src } => writeln!(f, "{}{} = {};", indent, dst, src),
        Stmt::If {
            cond,
            then,
            otherwise,
        } => {
            writeln!(f, "{}if {} {{", indent, cond)?;
            write_stmts(f, then, depth + 1)?;
            if !otherwise.is_empty() {
                writeln!(f, "{}}} else {{", indent)?;
                write_stmts(f, otherwise, depth + 1)?;
            }
            writeln!(f, "{}}}", indent)
        }
        Stmt::Block { label, body } => {
            writeln!(f, "{}block {} {{", indent, label)?;
            write_stmts(f, body, depth + 1)?;
            writeln!(f, "{}}}", indent)
        }
        Stmt::Loop { label, body } => {
            writeln!(f, "{}loop {} {{", indent, label)?;
            write_stmts(f, body, depth + 1)?;
            writeln!(f, "{}}}", indent)
        }
        Stmt::Labeled { label, body } => {
            writeln!(f, "{}{}:", indent, label)?;
            write_stmts(f, body, depth + 1)
        }
        Stmt::Goto(label) => writeln!(f, "{}goto {};", indent, label),
        Stmt::Break(label) => writeln!(f, "{}break {};", indent, label),
        Stmt::Continue(label) => writeln!(f, "{}continue {};", indent, label),
        Stmt::Return => writeln!(f, "{}return;", indent),
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

impl fmt::Display for StructuredFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .params
            .iter()
            .map(|param| format!("{}: {}", param, self.registers[param.index()].ty))
            .join(", ");
        writeln!(f, "fn {}({}) {{", self.name, params)?;
        write_stmts(f, &self.body, 1)?;
        writeln!(f, "}}")
    }
}
