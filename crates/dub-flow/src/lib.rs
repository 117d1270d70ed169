// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Lowering, analysis and structurization of dub functions.
//!
//! A [`ast::FunctionDecl`] from the frontend is lowered into a
//! [`function::FlowFunction`], analysed, and rebuilt into a
//! [`structured::StructuredFunction`] for code emission. [`pipeline::Pipeline`]
//! runs the whole sequence.

pub mod analysis;
pub mod ast;
pub mod eval;
pub mod function;
pub mod lower;
pub mod ops;
pub mod pipeline;
pub mod printer;
pub mod structured;
pub mod structurize;

pub use pipeline::{CompiledFunction, Pipeline, PipelineOptions, StructurizerKind};
