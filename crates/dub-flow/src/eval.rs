// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! A reference evaluator for flow functions and statement trees.
//!
//! Both drivers share one machine (input text, cursor, register file) and
//! record the same observable events, so a structurizer is correct when the
//! two runs of a function agree on every input.

use crate::function::FlowFunction;
use crate::ops::{BinaryOp, Constant, Op, RegisterId};
use crate::structured::{Condition, LabelId, Stmt, StructuredFunction};
use anyhow::{anyhow, bail, Result};
use dub_graph::Graph;

/// Statements or nodes executed before a run is abandoned.
pub const DEFAULT_FUEL: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Struct {
        name: String,
        fields: Vec<(String, Value)>,
    },
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::None => Value::None,
            Constant::Bool(value) => Value::Bool(*value),
            Constant::Int(value) => Value::Int(*value),
            Constant::Str(value) => Value::Str(value.clone()),
        }
    }
}

/// Observable side effects, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Call { name: String, args: Vec<Value> },
    Restore { cursor: usize },
    Return(Vec<Value>),
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
    Returned(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: Status,
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub outcome: Outcome,
    pub trace: Vec<Event>,
}

/// Walks the flow graph of `func` from Entry to Exit.
pub fn run_flow(func: &FlowFunction, input: &str, args: &[Value]) -> Result<Run> {
    let mut machine = Machine::new(func.num_registers(), func.params(), args, input)?;
    let mut node = Graph::ENTRY;
    while node != Graph::EXIT {
        machine.burn()?;
        let slot = match func.op(node) {
            Some(op) => machine.exec(op)?,
            None => 0,
        };
        node = func
            .graph
            .successor(node, slot)
            .ok_or_else(|| anyhow!("exit slot {} of {} is not attached", slot, node))?;
    }
    Ok(machine.finish())
}

/// Executes the statement tree of `func`.
pub fn run_structured(func: &StructuredFunction, input: &str, args: &[Value]) -> Result<Run> {
    let mut machine = Machine::new(func.registers.len(), &func.params, args, input)?;
    match machine.exec_stmts(&func.body)? {
        Control::Next | Control::Return => Ok(machine.finish()),
        Control::Break(label) | Control::Continue(label) | Control::Goto(label) => {
            bail!("jump to {} escapes `{}`", label, func.name)
        }
    }
}

enum Control {
    Next,
    Break(LabelId),
    Continue(LabelId),
    Goto(LabelId),
    Return,
}

struct Machine {
    input: Vec<char>,
    cursor: usize,
    registers: Vec<Value>,
    trace: Vec<Event>,
    fuel: usize,
    calls: i64,
    returned: Option<Vec<Value>>,
    failed: bool,
}

impl Machine {
    fn new(
        num_registers: usize,
        params: &[RegisterId],
        args: &[Value],
        input: &str,
    ) -> Result<Self> {
        if params.len() != args.len() {
            bail!("expected {} arguments, got {}", params.len(), args.len());
        }
        let mut registers = vec![Value::None; num_registers];
        for (param, arg) in params.iter().zip(args) {
            registers[param.index()] = arg.clone();
        }
        Ok(Machine {
            input: input.chars().collect(),
            cursor: 0,
            registers,
            trace: Vec::new(),
            fuel: DEFAULT_FUEL,
            calls: 0,
            returned: None,
            failed: false,
        })
    }

    fn burn(&mut self) -> Result<()> {
        if self.fuel == 0 {
            bail!("evaluation ran out of fuel");
        }
        self.fuel -= 1;
        Ok(())
    }

    fn get(&self, reg: RegisterId) -> &Value {
        &self.registers[reg.index()]
    }

    fn set(&mut self, reg: RegisterId, value: Value) {
        self.registers[reg.index()] = value;
    }

    fn finish(self) -> Run {
        let status = if self.failed {
            Status::Failure
        } else if let Some(values) = self.returned {
            Status::Returned(values)
        } else {
            Status::Success
        };
        Run {
            outcome: Outcome {
                status,
                cursor: self.cursor,
            },
            trace: self.trace,
        }
    }

    /// Executes `op` and returns the exit slot taken.
    fn exec(&mut self, op: &Op) -> Result<usize> {
        match op {
            Op::Const { dst, value } => self.set(*dst, value.into()),
            Op::Copy { dst, src } => self.set(*dst, self.get(*src).clone()),
            Op::Binary { dst, op, lhs, rhs } => {
                let value = binary(*op, self.get(*lhs), self.get(*rhs))?;
                self.set(*dst, value);
            }
            Op::Call { dst, name, args, .. } => {
                let args: Vec<Value> = args.iter().map(|arg| self.get(*arg).clone()).collect();
                self.trace.push(Event::Call {
                    name: name.clone(),
                    args,
                });
                self.calls += 1;
                if let Some(dst) = dst {
                    self.set(*dst, Value::Int(self.calls));
                }
            }
            Op::ConstructList { dst, items } => {
                let items = items.iter().map(|item| self.get(*item).clone()).collect();
                self.set(*dst, Value::List(items));
            }
            Op::ConstructStruct { dst, name, fields } => {
                let fields = fields
                    .iter()
                    .map(|(field, reg)| (field.clone(), self.get(*reg).clone()))
                    .collect();
                self.set(
                    *dst,
                    Value::Struct {
                        name: name.clone(),
                        fields,
                    },
                );
            }
            Op::Attr { dst, base, field } => {
                let value = match self.get(*base) {
                    Value::Struct { fields, .. } => fields
                        .iter()
                        .find(|(name, _)| name == field)
                        .map(|(_, value)| value.clone())
                        .ok_or_else(|| anyhow!("no field `{}` in {:?}", field, self.get(*base)))?,
                    other => bail!("attribute `{}` of non-struct {:?}", field, other),
                };
                self.set(*dst, value);
            }
            Op::Checkpoint { dst } => self.set(*dst, Value::Int(self.cursor as i64)),
            Op::Recover { src } => {
                self.cursor = match self.get(*src) {
                    Value::Int(cursor) => *cursor as usize,
                    other => bail!(
                        "recovering from {} which holds {:?}, not a checkpoint",
                        src,
                        other
                    ),
                };
                self.trace.push(Event::Restore {
                    cursor: self.cursor,
                });
            }
            Op::Literal { text } => {
                let len = text.chars().count();
                let matched = self.cursor + len <= self.input.len()
                    && self.input[self.cursor..self.cursor + len].iter().copied().eq(text.chars());
                if !matched {
                    return Ok(1);
                }
                self.cursor += len;
            }
            Op::Read { dst } => {
                let Some(&ch) = self.input.get(self.cursor) else {
                    return Ok(1);
                };
                self.cursor += 1;
                if let Some(dst) = dst {
                    self.set(*dst, Value::Str(ch.to_string()));
                }
            }
            Op::Switch { cond } => {
                return match self.get(*cond) {
                    Value::Bool(true) => Ok(0),
                    Value::Bool(false) => Ok(1),
                    other => bail!("switch on non-boolean {:?}", other),
                };
            }
            Op::SetReturn { values } => {
                let values: Vec<Value> =
                    values.iter().map(|value| self.get(*value).clone()).collect();
                self.trace.push(Event::Return(values.clone()));
                self.returned = Some(values);
            }
            Op::Failure => {
                self.trace.push(Event::Fail);
                self.failed = true;
            }
        }
        Ok(0)
    }

    fn test(&mut self, cond: &Condition) -> Result<bool> {
        match cond {
            Condition::Register(reg) => match self.get(*reg) {
                Value::Bool(value) => Ok(*value),
                other => bail!("condition on non-boolean {:?}", other),
            },
            Condition::Matches(op) => Ok(self.exec(op)? == 0),
            Condition::Not(inner) => Ok(!self.test(inner)?),
        }
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<Control> {
        let mut index = 0;
        while index < stmts.len() {
            match self.exec_stmt(&stmts[index])? {
                Control::Next => index += 1,
                Control::Goto(label) => {
                    let target = stmts.iter().position(
                        |stmt| matches!(stmt, Stmt::Labeled { label: l, .. } if *l == label),
                    );
                    match target {
                        Some(target) => index = target,
                        None => return Ok(Control::Goto(label)),
                    }
                }
                other => return Ok(other),
            }
        }
        Ok(Control::Next)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Control> {
        self.burn()?;
        Ok(match stmt {
            Stmt::Op(op) => {
                if self.exec(op)? != 0 {
                    bail!("`{}` left through a side exit outside of a condition", op);
                }
                Control::Next
            }
            Stmt::Assign { dst, src } => {
                self.set(*dst, self.get(*src).clone());
                Control::Next
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.test(cond)? {
                    self.exec_stmts(then)?
                } else {
                    self.exec_stmts(otherwise)?
                }
            }
            Stmt::Block { label, body } => match self.exec_stmts(body)? {
                Control::Break(target) if target == *label => Control::Next,
                other => other,
            },
            Stmt::Loop { label, body } => loop {
                self.burn()?;
                match self.exec_stmts(body)? {
                    Control::Continue(target) if target == *label => continue,
                    Control::Break(target) if target == *label => break Control::Next,
                    other => break other,
                }
            },
            Stmt::Labeled { body, .. } => self.exec_stmts(body)?,
            Stmt::Goto(label) => Control::Goto(*label),
            Stmt::Break(label) => Control::Break(*label),
            Stmt::Continue(label) => Control::Continue(*label),
            Stmt::Return => Control::Return,
        })
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    use Value::{Bool, Int, Str};
    Ok(match (op, lhs, rhs) {
        (BinaryOp::Eq, _, _) => Bool(lhs == rhs),
        (BinaryOp::Ne, _, _) => Bool(lhs != rhs),
        (BinaryOp::Add, Int(a), Int(b)) => Int(a.wrapping_add(*b)),
        (BinaryOp::Add, Str(a), Str(b)) => Str(format!("{}{}", a, b)),
        (BinaryOp::Sub, Int(a), Int(b)) => Int(a.wrapping_sub(*b)),
        (BinaryOp::Mul, Int(a), Int(b)) => Int(a.wrapping_mul(*b)),
        (BinaryOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (BinaryOp::Le, Int(a), Int(b)) => Bool(a <= b),
        (BinaryOp::Gt, Int(a), Int(b)) => Bool(a > b),
        (BinaryOp::Ge, Int(a), Int(b)) => Bool(a >= b),
        (BinaryOp::And, Bool(a), Bool(b)) => Bool(*a && *b),
        (BinaryOp::Or, Bool(a), Bool(b)) => Bool(*a || *b),
        _ => bail!("`{}` does not apply to {:?} and {:?}", op, lhs, rhs),
    })
}
