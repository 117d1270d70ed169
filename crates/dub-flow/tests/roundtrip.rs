// Copyright (c) Asymptotic
// SPDX-License-Identifier: Apache-2.0

//! Every structurizer must preserve the observable behaviour of the flow
//! graph it was given.

mod common;

use common::{all, init_logger, Scenario, Trees};
use dub_flow::analysis::FunctionAnalysis;
use dub_flow::eval::{run_flow, run_structured, Status, Value};
use dub_flow::lower::lower_function;
use dub_flow::structurize::{ClusterStructurizer, LabelStructurizer, Structurizer};

fn check(scenario: &Scenario, structurizer: &dyn Structurizer) {
    let flow = lower_function(&scenario.decl).unwrap();
    let analysis = FunctionAnalysis::compute(&flow, true, true);
    let structured = structurizer.structurize(&flow, &analysis).unwrap();
    for (input, args) in &scenario.runs {
        let expected = run_flow(&flow, input, args).unwrap();
        let actual = run_structured(&structured, input, args).unwrap();
        assert_eq!(
            actual,
            expected,
            "{} on `{}` with {:?} diverges:\n{}",
            structurizer.name(),
            scenario.decl.name,
            input,
            structured
        );
    }
}

#[test]
fn cluster_preserves_behaviour() {
    init_logger();
    for scenario in all() {
        check(&scenario, &ClusterStructurizer);
    }
}

#[test]
fn retree_preserves_behaviour() {
    init_logger();
    for scenario in all() {
        check(&scenario, &LabelStructurizer);
    }
}

#[test]
fn scenarios_reach_every_outcome() {
    let mut successes = 0;
    let mut failures = 0;
    let mut returns = 0;
    for scenario in all() {
        let flow = lower_function(&scenario.decl).unwrap();
        for (input, args) in &scenario.runs {
            match run_flow(&flow, input, args).unwrap().outcome.status {
                Status::Success => successes += 1,
                Status::Failure => failures += 1,
                Status::Returned(_) => returns += 1,
            }
        }
    }
    assert!(successes > 0 && failures > 0 && returns > 0);
}

#[test]
fn keyword_alternatives() {
    let flow = lower_function(&common::keyword().decl).unwrap();
    let run = run_flow(&flow, "ix", &[]).unwrap();
    assert_eq!(run.outcome.status, Status::Success);
    assert_eq!(run.outcome.cursor, 1);

    let run = run_flow(&flow, "", &[]).unwrap();
    assert_eq!(run.outcome.status, Status::Failure);
    assert_eq!(run.outcome.cursor, 0);
}

#[test]
fn counter_loops_until_the_bound() {
    let flow = lower_function(&common::counter().decl).unwrap();
    let run = run_flow(&flow, "", &[dub_flow::eval::Value::Int(3)]).unwrap();
    assert_eq!(
        run.outcome.status,
        Status::Returned(vec![dub_flow::eval::Value::Int(3)])
    );
    let ticks = run
        .trace
        .iter()
        .filter(|event| matches!(event, dub_flow::eval::Event::Call { name, .. } if name == "tick"))
        .count();
    assert_eq!(ticks, 3);
}

#[test]
fn random_trees_preserve_behaviour() {
    let mut trees = Trees::new(0x5eed_d0b);
    let mut checked = 0;
    for index in 0..400 {
        let decl = trees.function(index, 4);
        let flow = lower_function(&decl).unwrap();
        let analysis = FunctionAnalysis::compute(&flow, true, true);
        let clusters = ClusterStructurizer.structurize(&flow, &analysis).unwrap();
        let labels = LabelStructurizer.structurize(&flow, &analysis).unwrap();
        for input in Trees::INPUTS {
            for (flag, n) in [(true, 0), (false, 2)] {
                let args = [Value::Bool(flag), Value::Int(n)];
                let expected = match run_flow(&flow, input, &args) {
                    Ok(run) => run,
                    // repeating a body that matches without consuming input
                    Err(err) if err.to_string().contains("out of fuel") => continue,
                    Err(err) => {
                        panic!("`{}` on {:?}: {:#}\n{:?}", decl.name, input, err, decl.body)
                    }
                };
                for structured in [&clusters, &labels] {
                    let actual = run_structured(structured, input, &args).unwrap();
                    assert_eq!(
                        actual, expected,
                        "`{}` on {:?} diverges:\n{:?}\n{}",
                        decl.name, input, decl.body, structured
                    );
                }
                checked += 1;
            }
        }
    }
    assert!(checked > 0);
}
