// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

//! Execute hand-assembled expression programs, the same shape generated
//! registration code installs at startup.

use std::collections::HashMap;
use std::sync::Arc;

use analysis_engine_model::{
    ArithmeticMode, ArithmeticOp, AssignmentTarget, Closure, ClosureContract, ClosureExpression,
    ClosureProgram, ClosureStatement, ExpressionMeta, Layer, MalProgram, OpArg, OpNode,
    RuntimeOp, ScopeBinding, SourceLocation,
};
use analysis_engine_runtime::{
    CompiledExpression, CounterWindow, EvalOptions, Labels, RuntimeServices, Sample,
    SampleFamily, SampleMap,
};

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn input(name: &str, entries: &[(&[(&str, &str)], f64)]) -> SampleMap {
    let samples = entries
        .iter()
        .map(|(pairs, value)| Sample::new(name, labels(pairs), *value, 1_000))
        .collect();

    let mut map = HashMap::new();
    map.insert(name.to_string(), SampleFamily::build(samples));
    map
}

fn meta_for(scope: ScopeBinding) -> ExpressionMeta {
    ExpressionMeta {
        scope: Some(scope),
        aggregation_labels: vec!["svc".into()],
        downsampling: None,
        histogram: false,
        percentiles: vec![],
    }
}

/// `(cpu.sum(['svc']) * 100).service(['svc'], Layer.GENERAL)` as a static
/// program, the way a generated artifact builds it.
fn broadcast_program() -> MalProgram {
    MalProgram {
        metric_name: "meter_cpu_percent".to_string(),
        composed_expression: "(cpu.sum(['svc']) * 100).service(['svc'], Layer.GENERAL)"
            .to_string(),
        expression_hash: "0".repeat(64),
        init: false,
        root: OpNode::Call {
            receiver: Box::new(OpNode::Arithmetic {
                op: ArithmeticOp::Multiply,
                mode: ArithmeticMode::FamilyScalar,
                left: Box::new(OpNode::Call {
                    receiver: Box::new(OpNode::SampleRef { name: "cpu".into() }),
                    op: RuntimeOp::Sum,
                    args: vec![OpArg::StringList(vec!["svc".into()])],
                }),
                right: Box::new(OpNode::Scalar { value: 100.0 }),
            }),
            op: RuntimeOp::Service,
            args: vec![
                OpArg::StringList(vec!["svc".into()]),
                OpArg::Layer(Layer::General),
            ],
        },
        closures: vec![],
        meta: meta_for(ScopeBinding::Service {
            keys: vec!["svc".into()],
            layer: Layer::General,
        }),
    }
}

#[test]
fn test_program_execution_binds_scope_and_broadcasts() {
    let compiled = CompiledExpression::new(Arc::new(broadcast_program())).unwrap();
    let samples = input("cpu", &[(&[("svc", "a")], 0.2), (&[("svc", "b")], 0.5)]);

    let result = compiled.run(&samples, &RuntimeServices::new());

    assert_eq!(2, result.get_samples().len());
    assert_eq!(
        Some(&ScopeBinding::Service {
            keys: vec!["svc".into()],
            layer: Layer::General,
        }),
        result.get_scope()
    );

    let by_svc: HashMap<&str, f64> = result
        .get_samples()
        .iter()
        .map(|s| (s.get_labels()["svc"].as_str(), s.get_value()))
        .collect();
    assert_eq!(Some(&20.0), by_svc.get("a"));
    assert_eq!(Some(&50.0), by_svc.get("b"));
}

#[test]
fn test_missing_sample_and_failed_closure_degrade_to_empty() {
    let compiled = CompiledExpression::new(Arc::new(broadcast_program())).unwrap();

    // Missing sample family.
    let result = compiled.run(&HashMap::new(), &RuntimeServices::new());
    assert!(result.is_empty());

    // A closure that dereferences null fails at run time; the expression
    // returns EMPTY instead of propagating.
    let mut program = broadcast_program();
    program.metric_name = "meter_cpu_bad_closure".to_string();
    program.root = OpNode::Call {
        receiver: Box::new(OpNode::Call {
            receiver: Box::new(OpNode::SampleRef { name: "cpu".into() }),
            op: RuntimeOp::Tag,
            args: vec![OpArg::ClosureRef(0)],
        }),
        op: RuntimeOp::Service,
        args: vec![
            OpArg::StringList(vec!["svc".into()]),
            OpArg::Layer(Layer::General),
        ],
    };
    program.closures = vec![ClosureProgram {
        index: 0,
        contract: ClosureContract::TagRewrite,
        closure: Closure::new(
            vec!["tags".into()],
            vec![ClosureStatement::Assign {
                target: AssignmentTarget::Index {
                    receiver: ClosureExpression::Identifier("tags".into()),
                    key: ClosureExpression::Str("x".into()),
                },
                value: ClosureExpression::Property {
                    receiver: Box::new(ClosureExpression::Identifier("missing".into())),
                    name: "y".into(),
                    null_safe: false,
                },
                location: SourceLocation::generated(),
            }],
            SourceLocation::generated(),
        ),
    }];

    let compiled = CompiledExpression::new(Arc::new(program)).unwrap();
    let samples = input("cpu", &[(&[("svc", "a")], 0.2)]);
    assert!(compiled.run(&samples, &RuntimeServices::new()).is_empty());
}

#[test]
fn test_counter_window_is_shared_but_discriminable() {
    let window = CounterWindow::new();
    let services = RuntimeServices::new();

    let mut program = broadcast_program();
    program.metric_name = "meter_cpu_rate".to_string();
    program.root = OpNode::Call {
        receiver: Box::new(OpNode::Call {
            receiver: Box::new(OpNode::SampleRef { name: "cpu".into() }),
            op: RuntimeOp::Rate,
            args: vec![OpArg::Str("PT1M".into())],
        }),
        op: RuntimeOp::Service,
        args: vec![
            OpArg::StringList(vec!["svc".into()]),
            OpArg::Layer(Layer::General),
        ],
    };
    let compiled = CompiledExpression::new(Arc::new(program)).unwrap();

    let options_a = EvalOptions {
        window_discriminator: Some("a".into()),
    };
    let options_b = EvalOptions {
        window_discriminator: Some("b".into()),
    };

    let first = |ts: i64, value: f64| {
        let samples = vec![Sample::new("cpu", labels(&[("svc", "x")]), value, ts)];
        let mut map = HashMap::new();
        map.insert("cpu".to_string(), SampleFamily::build(samples));
        map
    };

    // Priming under discriminator a leaves discriminator b unprimed.
    let primed = compiled.run_with_options(&first(0, 10.0), &services, &options_a, &window);
    assert!(primed.is_empty());

    let other = compiled.run_with_options(&first(30_000, 13.0), &services, &options_b, &window);
    assert!(other.is_empty());

    let rate = compiled.run_with_options(&first(60_000, 70.0), &services, &options_a, &window);
    assert_eq!(1, rate.get_samples().len());
    assert_eq!(1.0, rate.get_samples()[0].get_value());
}
