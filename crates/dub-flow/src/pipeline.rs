// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! The per-function compilation pipeline: lowering, analysis and
//! structurization, driven by [`PipelineOptions`].

use crate::analysis::FunctionAnalysis;
use crate::ast::FunctionDecl;
use crate::function::FlowFunction;
use crate::lower::lower_function;
use crate::printer::cfg_to_dot;
use crate::structured::StructuredFunction;
use crate::structurize::{ClusterStructurizer, IrreducibleGraph, LabelStructurizer, Structurizer};
use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StructurizerKind {
    /// Nested blocks and loops along the dominator tree; falls back to
    /// `retree` on irreducible graphs
    #[default]
    Cluster,
    /// Labelled statements connected by gotos
    Retree,
}

impl fmt::Display for StructurizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructurizerKind::Cluster => write!(f, "cluster"),
            StructurizerKind::Retree => write!(f, "retree"),
        }
    }
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[clap(next_help_heading = "Pipeline Options")]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOptions {
    /// Structurizer used to rebuild statements from the flow graph
    #[clap(long = "structurizer", value_enum, default_value_t = StructurizerKind::Cluster)]
    pub structurizer: StructurizerKind,

    /// Skip phi placement
    #[clap(long = "no-phis", action = clap::ArgAction::SetFalse)]
    pub place_phis: bool,

    /// Place phis wherever a definition reaches a join, even for dead variables
    #[clap(long = "no-liveness-pruning", action = clap::ArgAction::SetFalse)]
    pub prune_phis: bool,

    /// Keep a Graphviz rendering of each flow graph
    #[clap(long = "dump-cfg")]
    pub dump_cfg: bool,

    /// Keep a listing of each structured function
    #[clap(long = "dump-structured")]
    pub dump_structured: bool,

    /// Log the time spent in each pass
    #[clap(long = "profile")]
    pub profile: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            structurizer: StructurizerKind::Cluster,
            place_phis: true,
            prune_phis: true,
            dump_cfg: false,
            dump_structured: false,
            profile: false,
        }
    }
}

impl PipelineOptions {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing pipeline options")
    }
}

/// Everything the pipeline produced for one function.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub flow: FlowFunction,
    pub analysis: FunctionAnalysis,
    pub structured: StructuredFunction,
    /// Name of the structurizer that produced `structured`.
    pub structurizer: &'static str,
    pub cfg_dot: Option<String>,
    pub listing: Option<String>,
    /// Time per pass, filled when profiling.
    pub timings: Vec<(&'static str, Duration)>,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Compiles functions one after another, stopping at the first error.
    pub fn compile_module(&self, decls: &[FunctionDecl]) -> Result<Vec<CompiledFunction>> {
        info!("compiling {} functions", decls.len());
        decls.iter().map(|decl| self.compile(decl)).collect()
    }

    pub fn compile(&self, decl: &FunctionDecl) -> Result<CompiledFunction> {
        let mut timings = Vec::new();
        let flow = self.timed(&mut timings, "lower", || lower_function(decl))?;
        self.compile_flow_with(flow, timings)
    }

    /// Runs analysis and structurization on an already lowered function.
    pub fn compile_flow(&self, flow: FlowFunction) -> Result<CompiledFunction> {
        self.compile_flow_with(flow, Vec::new())
    }

    fn compile_flow_with(
        &self,
        flow: FlowFunction,
        mut timings: Vec<(&'static str, Duration)>,
    ) -> Result<CompiledFunction> {
        let options = &self.options;
        let cfg_dot = options.dump_cfg.then(|| cfg_to_dot(&flow));
        if let Some(dot) = &cfg_dot {
            debug!("flow graph of `{}`:\n{}", flow.name, dot);
        }

        let analysis = self.timed(&mut timings, "analyze", || {
            FunctionAnalysis::compute(&flow, options.place_phis, options.prune_phis)
        });

        let (structured, structurizer) = self.timed(&mut timings, "structurize", || {
            self.structurize(&flow, &analysis)
        })?;
        let listing = options.dump_structured.then(|| structured.to_string());
        if let Some(listing) = &listing {
            debug!("structured `{}`:\n{}", flow.name, listing);
        }

        if options.profile {
            for (pass, elapsed) in &timings {
                info!("`{}`: {} took {:?}", flow.name, pass, elapsed);
            }
        }

        Ok(CompiledFunction {
            flow,
            analysis,
            structured,
            structurizer,
            cfg_dot,
            listing,
            timings,
        })
    }

    fn structurize(
        &self,
        flow: &FlowFunction,
        analysis: &FunctionAnalysis,
    ) -> Result<(StructuredFunction, &'static str)> {
        let primary: &dyn Structurizer = match self.options.structurizer {
            StructurizerKind::Cluster => &ClusterStructurizer,
            StructurizerKind::Retree => &LabelStructurizer,
        };
        match primary.structurize(flow, analysis) {
            Ok(structured) => Ok((structured, primary.name())),
            Err(err) if err.downcast_ref::<IrreducibleGraph>().is_some() => {
                warn!("`{}`: {}; falling back to {}", flow.name, err, LabelStructurizer.name());
                let structured = LabelStructurizer
                    .structurize(flow, analysis)
                    .with_context(|| format!("structurizing `{}`", flow.name))?;
                Ok((structured, LabelStructurizer.name()))
            }
            Err(err) => Err(err.context(format!(
                "structurizing `{}` with {}",
                flow.name,
                primary.name()
            ))),
        }
    }

    fn timed<T>(
        &self,
        timings: &mut Vec<(&'static str, Duration)>,
        pass: &'static str,
        run: impl FnOnce() -> T,
    ) -> T {
        if !self.options.profile {
            return run();
        }
        let start = Instant::now();
        let result = run();
        timings.push((pass, start.elapsed()));
        result
    }
}
