// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Lowering of construct trees into flow graphs.
//!
//! Every construct lowers into a fresh [`Region`] with one exit group per
//! [`Flow`] kind, and the enclosing construct splices it onto its own normal
//! flow. Backtracking is explicit: constructs that may have to undo a partial
//! match save the cursor with a checkpoint and restore it on their failure
//! path.

use crate::ast::{Construct, Expr, FunctionDecl, Type};
use crate::function::FlowFunction;
use crate::ops::{
    Constant, Flow, Op, RegisterId, COND_FALSE, COND_TRUE, EXCEPTION, FAIL, NORMAL, RETURN,
};
use anyhow::{anyhow, bail, Context, Result};
use dub_graph::{Graph, NodeId, Region};
use log::debug;
use std::collections::BTreeMap;

/// Lowers a function declaration into a flow function.
///
/// Normal, return and exception flows of the body reach Exit directly; the
/// failure flow passes through a [`Op::Failure`] node first.
pub fn lower_function(decl: &FunctionDecl) -> Result<FlowFunction> {
    let mut lowering = Lowering::new(decl)?;
    let body = lowering
        .lower(&decl.body)
        .with_context(|| format!("lowering function `{}`", decl.name))?;
    let func = lowering.finish(body);
    debug!(
        "lowered `{}` into {} nodes and {} registers",
        func.name,
        func.graph.num_nodes(),
        func.num_registers()
    );
    Ok(func)
}

struct Lowering {
    func: FlowFunction,
    scope: BTreeMap<String, RegisterId>,
    temps: usize,
}

/// Where the exits of a freshly emitted node go.
enum Routing {
    /// Slot `i` joins group `i`.
    Default,
    /// Every slot joins one group.
    All(usize),
    /// Normal and exception slots of a raising call.
    Raising,
    /// Left dangling for the caller.
    Manual,
}

impl Lowering {
    fn new(decl: &FunctionDecl) -> Result<Self> {
        let mut func = FlowFunction::new(decl.name.clone());
        func.set_returns(decl.returns.clone());
        let mut scope = BTreeMap::new();
        for param in &decl.params {
            let reg = func.new_param(param.name.clone(), param.ty.clone());
            if scope.insert(param.name.clone(), reg).is_some() {
                bail!("`{}` is declared twice in `{}`", param.name, decl.name);
            }
        }
        for local in &decl.locals {
            let reg = func.new_register(local.name.clone(), local.ty.clone());
            if scope.insert(local.name.clone(), reg).is_some() {
                bail!("`{}` is declared twice in `{}`", local.name, decl.name);
            }
        }
        Ok(Lowering {
            func,
            scope,
            temps: 0,
        })
    }

    fn region(&mut self) -> Region {
        Region::new(&mut self.func.graph, Flow::COUNT)
    }

    fn temp(&mut self, ty: Type) -> RegisterId {
        let name = format!("t{}", self.temps);
        self.temps += 1;
        self.func.new_register(name, ty)
    }

    fn lookup(&self, name: &str) -> Result<RegisterId> {
        self.scope
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("use of undeclared variable `{}`", name))
    }

    /// Appends `op` to the normal flow of `region`.
    fn emit(&mut self, region: &mut Region, op: Op) -> NodeId {
        let routing = match &op {
            Op::Switch { .. } => Routing::Manual,
            Op::SetReturn { .. } => Routing::All(RETURN),
            Op::Call { raises: true, .. } => Routing::Raising,
            _ => Routing::Default,
        };
        let node = self.func.add_op(op);
        let graph = &mut self.func.graph;
        region.connect(graph, NORMAL, node);
        match routing {
            Routing::Default => region.attach_default_exits(graph, node),
            Routing::All(flow) => region.attach_flow(graph, flow, node),
            Routing::Raising => {
                region.register_exit(graph.exit_edge(node, 0), NORMAL);
                region.register_exit(graph.exit_edge(node, 1), EXCEPTION);
            }
            Routing::Manual => {}
        }
        node
    }

    fn splice(&mut self, region: &mut Region, other: Region) {
        region.splice(&mut self.func.graph, NORMAL, other);
    }

    fn lower(&mut self, construct: &Construct) -> Result<Region> {
        let mut region = self.region();
        match construct {
            Construct::Sequence(items) => {
                for item in items {
                    if !region.has_flow(NORMAL) {
                        debug!("dropping constructs after a sequence element that never continues");
                        break;
                    }
                    let sub = self.lower(item)?;
                    self.splice(&mut region, sub);
                }
            }
            Construct::Choice(alternatives) => {
                if alternatives.is_empty() {
                    region.merge_flow_into(NORMAL, FAIL);
                    return Ok(region);
                }
                let saved = self.temp(Type::Int);
                self.emit(&mut region, Op::Checkpoint { dst: saved });
                let mut successes = Vec::new();
                for (index, alternative) in alternatives.iter().enumerate() {
                    if index > 0 {
                        region.merge_flow_into(FAIL, NORMAL);
                        self.emit(&mut region, Op::Recover { src: saved });
                    }
                    let sub = self.lower(alternative)?;
                    self.splice(&mut region, sub);
                    successes.extend(region.take_flow(NORMAL));
                    if !region.has_flow(FAIL) {
                        break;
                    }
                }
                for edge in successes {
                    region.register_exit(edge, NORMAL);
                }
            }
            Construct::Repeat { body, min } => {
                for _ in 0..*min {
                    if !region.has_flow(NORMAL) {
                        break;
                    }
                    let sub = self.lower(body)?;
                    self.splice(&mut region, sub);
                }
                if !region.has_flow(NORMAL) {
                    return Ok(region);
                }
                // failures of the mandatory copies fail the whole repeat
                let required = region.take_flow(FAIL);
                let saved = self.temp(Type::Int);
                let head = self.emit(&mut region, Op::Checkpoint { dst: saved });
                let sub = self.lower(body)?;
                self.splice(&mut region, sub);
                for edge in region.take_flow(NORMAL) {
                    self.func.graph.attach(edge, head);
                }
                self.recover_failures(&mut region, saved);
                for edge in required {
                    region.register_exit(edge, FAIL);
                }
            }
            Construct::Optional(body) => {
                let saved = self.temp(Type::Int);
                self.emit(&mut region, Op::Checkpoint { dst: saved });
                let sub = self.lower(body)?;
                self.splice(&mut region, sub);
                self.recover_failures(&mut region, saved);
            }
            Construct::Lookahead { body, negate } => {
                let saved = self.temp(Type::Int);
                self.emit(&mut region, Op::Checkpoint { dst: saved });
                let sub = self.lower(body)?;
                self.splice(&mut region, sub);
                if region.has_flow(NORMAL) {
                    self.emit(&mut region, Op::Recover { src: saved });
                }
                if *negate {
                    region.swap(NORMAL, FAIL);
                    if region.has_flow(NORMAL) {
                        self.emit(&mut region, Op::Recover { src: saved });
                    }
                }
            }
            Construct::Literal(text) => {
                self.emit(&mut region, Op::Literal { text: text.clone() });
            }
            Construct::Read { dst } => {
                let dst = dst.as_deref().map(|name| self.lookup(name)).transpose()?;
                self.emit(&mut region, Op::Read { dst });
            }
            Construct::Assign { name, value } => {
                let dst = self.lookup(name)?;
                let src = self.lower_expr(&mut region, value)?;
                self.emit(&mut region, Op::Copy { dst, src });
            }
            Construct::Eval(Expr::Call { name, args, raises }) => {
                self.lower_call(&mut region, None, name, args, *raises)?;
            }
            Construct::Eval(expr) => {
                self.lower_expr(&mut region, expr)?;
            }
            Construct::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.lower_expr(&mut region, cond)?;
                let switch = self.emit(&mut region, Op::Switch { cond });
                for (slot, arm) in [(COND_TRUE, then), (COND_FALSE, otherwise)] {
                    let body = self.lower(arm)?;
                    let graph = &mut self.func.graph;
                    let entry = graph.exit_edge(switch, slot);
                    let mut arm_region = Region::from_edge(graph, entry, Flow::COUNT);
                    arm_region.splice(graph, NORMAL, body);
                    region.absorb_exits(arm_region);
                }
            }
            Construct::Fail => region.merge_flow_into(NORMAL, FAIL),
            Construct::Return(values) => {
                let values = values
                    .iter()
                    .map(|value| self.lower_expr(&mut region, value))
                    .collect::<Result<Vec<_>>>()?;
                self.emit(&mut region, Op::SetReturn { values });
            }
        }
        Ok(region)
    }

    /// Restores the cursor on the failure flow of `region` and continues it as
    /// normal flow.
    fn recover_failures(&mut self, region: &mut Region, saved: RegisterId) {
        if !region.has_flow(FAIL) {
            return;
        }
        let successes = region.take_flow(NORMAL);
        region.merge_flow_into(FAIL, NORMAL);
        self.emit(region, Op::Recover { src: saved });
        for edge in successes {
            region.register_exit(edge, NORMAL);
        }
    }

    fn lower_expr(&mut self, region: &mut Region, expr: &Expr) -> Result<RegisterId> {
        let (dst, op) = match expr {
            Expr::Var(name) => return self.lookup(name),
            Expr::Call { name, args, raises } => {
                let dst = self.temp(Type::Any);
                self.lower_call(region, Some(dst), name, args, *raises)?;
                return Ok(dst);
            }
            Expr::Const(value) => {
                let ty = match value {
                    Constant::None => Type::Any,
                    Constant::Bool(_) => Type::Bool,
                    Constant::Int(_) => Type::Int,
                    Constant::Str(_) => Type::Str,
                };
                let dst = self.temp(ty);
                (
                    dst,
                    Op::Const {
                        dst,
                        value: value.clone(),
                    },
                )
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(region, lhs)?;
                let rhs = self.lower_expr(region, rhs)?;
                let dst = self.temp(Type::Any);
                (
                    dst,
                    Op::Binary {
                        dst,
                        op: *op,
                        lhs,
                        rhs,
                    },
                )
            }
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.lower_expr(region, item))
                    .collect::<Result<Vec<_>>>()?;
                let dst = self.temp(Type::List(Box::new(Type::Any)));
                (dst, Op::ConstructList { dst, items })
            }
            Expr::Struct { name, fields } => {
                let fields = fields
                    .iter()
                    .map(|(field, value)| -> Result<(String, RegisterId)> {
                        Ok((field.clone(), self.lower_expr(region, value)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let dst = self.temp(Type::Struct(name.clone()));
                (
                    dst,
                    Op::ConstructStruct {
                        dst,
                        name: name.clone(),
                        fields,
                    },
                )
            }
            Expr::Attr { base, field } => {
                let base = self.lower_expr(region, base)?;
                let dst = self.temp(Type::Any);
                (
                    dst,
                    Op::Attr {
                        dst,
                        base,
                        field: field.clone(),
                    },
                )
            }
        };
        self.emit(region, op);
        Ok(dst)
    }

    fn lower_call(
        &mut self,
        region: &mut Region,
        dst: Option<RegisterId>,
        name: &str,
        args: &[Expr],
        raises: bool,
    ) -> Result<()> {
        let args = args
            .iter()
            .map(|arg| self.lower_expr(region, arg))
            .collect::<Result<Vec<_>>>()?;
        self.emit(
            region,
            Op::Call {
                dst,
                name: name.to_string(),
                args,
                raises,
            },
        );
        Ok(())
    }

    fn finish(mut self, body: Region) -> FlowFunction {
        let mut top = Region::rooted(&self.func.graph, Graph::ENTRY, Flow::COUNT);
        top.splice(&mut self.func.graph, NORMAL, body);
        for flow in [NORMAL, RETURN, EXCEPTION] {
            if top.has_flow(flow) {
                top.connect(&mut self.func.graph, flow, Graph::EXIT);
            }
        }
        if top.has_flow(FAIL) {
            let failure = self.func.add_op(Op::Failure);
            top.connect(&mut self.func.graph, FAIL, failure);
            self.func.graph.connect(failure, 0, Graph::EXIT);
        }
        self.func
    }
}
