// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Graph IR for the dub compiler: an append-only graph store, a region builder
//! for compositional construction, and the dominance, liveness and phi
//! placement analyses run on it.

pub mod dominance;
pub mod graph;
pub mod liveness;
pub mod region;
pub mod ssi;

pub use dominance::{DominanceFrontiers, Dominators, ReversePostorder};
pub use graph::{EdgeId, Graph, NodeId};
pub use liveness::{AlwaysLive, Liveness, LivenessOracle, VarId};
pub use region::{Flow, Region};
pub use ssi::{PhiPlacement, UseEvent};
