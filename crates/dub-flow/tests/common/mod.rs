// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use dub_flow::ast::{Construct, Expr, FunctionDecl, Local, Type};
use dub_flow::eval::Value;
use dub_flow::ops::{BinaryOp, Constant};
use simplelog::{Config, LevelFilter, TestLogger};

pub fn init_logger() {
    // several tests in one binary may race to install it
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
}

/// A function under test together with the inputs it is run on.
pub struct Scenario {
    pub decl: FunctionDecl,
    pub runs: Vec<(&'static str, Vec<Value>)>,
}

fn decl(name: &str, params: Vec<Local>, locals: Vec<Local>, body: Construct) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        params,
        locals,
        returns: vec![],
        body,
    }
}

fn seq(items: Vec<Construct>) -> Construct {
    Construct::Sequence(items)
}

fn read_into(name: &str) -> Construct {
    Construct::Read {
        dst: Some(name.to_string()),
    }
}

fn no_args(inputs: &[&'static str]) -> Vec<(&'static str, Vec<Value>)> {
    inputs.iter().map(|input| (*input, vec![])).collect()
}

/// Ordered choice between keywords and a one-character identifier.
pub fn keyword() -> Scenario {
    Scenario {
        decl: decl(
            "keyword",
            vec![],
            vec![Local::new("c", Type::Str)],
            Construct::Choice(vec![
                seq(vec![Construct::literal("if"), Construct::emit("kw_if", vec![])]),
                seq(vec![Construct::literal("in"), Construct::emit("kw_in", vec![])]),
                seq(vec![read_into("c"), Construct::emit("ident", vec![Expr::var("c")])]),
            ]),
        ),
        runs: no_args(&["if", "in", "ix", "", "z"]),
    }
}

/// One or more characters up to a terminating `;`.
pub fn statement() -> Scenario {
    let item = seq(vec![
        Construct::lookahead(Construct::literal(";"), true),
        read_into("c"),
        Construct::emit("char", vec![Expr::var("c")]),
    ]);
    Scenario {
        decl: decl(
            "statement",
            vec![],
            vec![Local::new("c", Type::Str)],
            seq(vec![
                Construct::repeat(item, 1),
                Construct::literal(";"),
                Construct::emit("done", vec![]),
            ]),
        ),
        runs: no_args(&["ab;", ";", "abc", "a;b", ""]),
    }
}

/// Branches on a parameter and returns a computed value.
pub fn branchy() -> Scenario {
    Scenario {
        decl: FunctionDecl {
            returns: vec![Type::Int],
            ..decl(
                "branchy",
                vec![Local::new("n", Type::Int)],
                vec![Local::new("y", Type::Int)],
                seq(vec![
                    Construct::if_else(
                        Expr::binary(BinaryOp::Lt, Expr::var("n"), Expr::int(3)),
                        seq(vec![
                            Construct::literal("a"),
                            Construct::assign(
                                "y",
                                Expr::binary(BinaryOp::Add, Expr::var("n"), Expr::int(1)),
                            ),
                        ]),
                        Construct::Fail,
                    ),
                    Construct::Return(vec![Expr::var("y")]),
                ]),
            )
        },
        runs: vec![
            ("a", vec![Value::Int(1)]),
            ("b", vec![Value::Int(1)]),
            ("a", vec![Value::Int(5)]),
        ],
    }
}

/// Groups of `x` in parentheses, repeated.
pub fn nested_loops() -> Scenario {
    let group = seq(vec![
        Construct::literal("("),
        Construct::repeat(Construct::literal("x"), 0),
        Construct::literal(")"),
        Construct::emit("group", vec![]),
    ]);
    Scenario {
        decl: decl(
            "nested_loops",
            vec![],
            vec![],
            seq(vec![Construct::repeat(group, 0), Construct::literal("!")]),
        ),
        runs: no_args(&["!", "()!", "(xx)(x)!", "(x", "(xx)(", ""]),
    }
}

/// Early return, explicit failure and a fallback alternative.
pub fn early_exit() -> Scenario {
    Scenario {
        decl: FunctionDecl {
            returns: vec![Type::Int],
            ..decl(
                "early_exit",
                vec![],
                vec![],
                seq(vec![
                    Construct::Choice(vec![
                        seq(vec![Construct::literal("x"), Construct::Return(vec![Expr::int(1)])]),
                        seq(vec![Construct::literal("y"), Construct::Fail]),
                        Construct::emit("fallback", vec![]),
                    ]),
                    Construct::optional(Construct::literal("!")),
                    Construct::Return(vec![Expr::int(2)]),
                ]),
            )
        },
        runs: no_args(&["x", "y", "z", "!", ""]),
    }
}

/// Negative and positive lookahead around a single read.
pub fn lookahead() -> Scenario {
    Scenario {
        decl: decl(
            "lookahead",
            vec![],
            vec![],
            seq(vec![
                Construct::lookahead(Construct::literal("no"), true),
                Construct::Read { dst: None },
                Construct::lookahead(Construct::literal("k"), false),
                Construct::emit("took", vec![]),
            ]),
        ),
        runs: no_args(&["ok", "no", "nk", "n", "xk"]),
    }
}

/// Aggregates: structs, attribute access and lists.
pub fn aggregates() -> Scenario {
    Scenario {
        decl: FunctionDecl {
            returns: vec![Type::Int],
            ..decl(
                "aggregates",
                vec![Local::new("n", Type::Int)],
                vec![
                    Local::new("p", Type::Struct("Point".to_string())),
                    Local::new("y", Type::Int),
                ],
                seq(vec![
                    Construct::assign(
                        "p",
                        Expr::Struct {
                            name: "Point".to_string(),
                            fields: vec![
                                ("x".to_string(), Expr::var("n")),
                                ("y".to_string(), Expr::Const(Constant::Int(7))),
                            ],
                        },
                    ),
                    Construct::assign(
                        "y",
                        Expr::Attr {
                            base: Box::new(Expr::var("p")),
                            field: "x".to_string(),
                        },
                    ),
                    Construct::emit(
                        "show",
                        vec![Expr::List(vec![
                            Expr::var("y"),
                            Expr::Const(Constant::Str("z".to_string())),
                        ])],
                    ),
                    Construct::Return(vec![Expr::var("y")]),
                ]),
            )
        },
        runs: vec![("", vec![Value::Int(4)])],
    }
}

/// A loop whose only exit is a conditional break on a counter.
pub fn counter() -> Scenario {
    Scenario {
        decl: FunctionDecl {
            returns: vec![Type::Int],
            ..decl(
                "counter",
                vec![Local::new("n", Type::Int)],
                vec![Local::new("i", Type::Int)],
                seq(vec![
                    Construct::assign("i", Expr::int(0)),
                    Construct::repeat(
                        seq(vec![
                            Construct::if_else(
                                Expr::binary(BinaryOp::Lt, Expr::var("i"), Expr::var("n")),
                                Construct::Sequence(vec![]),
                                Construct::Fail,
                            ),
                            Construct::emit("tick", vec![Expr::var("i")]),
                            Construct::assign(
                                "i",
                                Expr::binary(BinaryOp::Add, Expr::var("i"), Expr::int(1)),
                            ),
                        ]),
                        0,
                    ),
                    Construct::Return(vec![Expr::var("i")]),
                ]),
            )
        },
        runs: vec![
            ("", vec![Value::Int(0)]),
            ("", vec![Value::Int(3)]),
        ],
    }
}

pub fn all() -> Vec<Scenario> {
    vec![
        keyword(),
        statement(),
        branchy(),
        nested_loops(),
        early_exit(),
        lookahead(),
        aggregates(),
        counter(),
    ]
}

/// Seeded xorshift source for random construct trees.
pub struct Trees(u64);

impl Trees {
    pub const INPUTS: [&'static str; 6] = ["", "a", "b", "ab", "ba", "aab"];

    pub fn new(seed: u64) -> Self {
        Trees(seed.max(1))
    }

    pub fn below(&mut self, bound: usize) -> usize {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 % bound as u64) as usize
    }

    /// A function over params `flag: bool` and `n: int` with a random body.
    pub fn function(&mut self, index: usize, depth: usize) -> FunctionDecl {
        FunctionDecl {
            returns: vec![Type::Int],
            ..decl(
                &format!("random_{}", index),
                vec![Local::new("flag", Type::Bool), Local::new("n", Type::Int)],
                vec![Local::new("c", Type::Str)],
                self.construct(depth),
            )
        }
    }

    pub fn construct(&mut self, depth: usize) -> Construct {
        if depth == 0 || self.below(4) == 0 {
            return self.leaf();
        }
        let depth = depth - 1;
        match self.below(9) {
            0 => {
                let len = 1 + self.below(3);
                seq((0..len).map(|_| self.construct(depth)).collect())
            }
            1 => {
                let len = 1 + self.below(3);
                Construct::Choice((0..len).map(|_| self.construct(depth)).collect())
            }
            2 => Construct::repeat(self.construct(depth), 0),
            3 => Construct::repeat(self.construct(depth), 1),
            4 => Construct::optional(self.construct(depth)),
            5 => Construct::lookahead(self.construct(depth), false),
            6 => Construct::lookahead(self.construct(depth), true),
            7 => {
                let cond = self.condition();
                Construct::if_else(cond, self.construct(depth), self.construct(depth))
            }
            _ => seq(vec![self.construct(depth), self.construct(depth)]),
        }
    }

    fn condition(&mut self) -> Expr {
        if self.below(2) == 0 {
            Expr::var("flag")
        } else {
            Expr::binary(BinaryOp::Lt, Expr::var("n"), Expr::int(3))
        }
    }

    fn leaf(&mut self) -> Construct {
        match self.below(9) {
            0 => Construct::literal("a"),
            1 => Construct::literal("b"),
            2 => Construct::literal("ab"),
            3 => read_into("c"),
            4 => Construct::assign("n", Expr::binary(BinaryOp::Add, Expr::var("n"), Expr::int(1))),
            5 => Construct::emit("mark", vec![Expr::var("n")]),
            6 => Construct::Fail,
            7 => Construct::Return(vec![Expr::var("n")]),
            _ => Construct::Sequence(vec![]),
        }
    }
}
