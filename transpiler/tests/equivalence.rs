// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

//! Fresh-vs-compiled equivalence: for any sample map, running the compiled
//! expression must match interpreting the parsed expression tree directly
//! over the sample family runtime.

mod common;

use std::sync::Arc;

use analysis_engine_mal_parser::MalParser;
use analysis_engine_model::{
    ClosureContract, DownsamplingType, Layer, MalExpression, MalParameter, ScopeBinding,
};
use analysis_engine_runtime::{
    CompiledClosure, CompiledExpression, CounterWindow, EvalOptions, RuntimeServices,
    SampleFamily, SampleMap, global_counter_window,
};
use analysis_engine_transpiler::transpile_expression;

use common::{assert_family_eq, family, family_at, labels, sample_map};

enum RefValue {
    Scalar(f64),
    Family(SampleFamily),
}

/// Reference interpretation of a parsed expression: dynamic dispatch over
/// the same sample family runtime the compiled path calls into.
fn interpret(
    expression: &MalExpression,
    samples: &SampleMap,
    services: &RuntimeServices,
    window: &CounterWindow,
    discriminator: Option<&str>,
) -> RefValue {
    match expression {
        MalExpression::SampleRef { name, .. } => RefValue::Family(
            samples
                .get(name.as_ref())
                .cloned()
                .unwrap_or_else(SampleFamily::empty),
        ),
        MalExpression::Number { value, .. } => RefValue::Scalar(*value),
        MalExpression::Arithmetic {
            op, left, right, ..
        } => {
            let left = interpret(left, samples, services, window, discriminator);
            let right = interpret(right, samples, services, window, discriminator);
            match (left, right) {
                (RefValue::Scalar(a), RefValue::Scalar(b)) => {
                    RefValue::Scalar(if *op == analysis_engine_model::ArithmeticOp::Divide && b == 0.0 {
                        f64::NAN
                    } else {
                        match op {
                            analysis_engine_model::ArithmeticOp::Add => a + b,
                            analysis_engine_model::ArithmeticOp::Subtract => a - b,
                            analysis_engine_model::ArithmeticOp::Multiply => a * b,
                            analysis_engine_model::ArithmeticOp::Divide => a / b,
                        }
                    })
                }
                (RefValue::Family(f), RefValue::Scalar(s)) => {
                    RefValue::Family(f.scalar_op(*op, s, false))
                }
                (RefValue::Scalar(s), RefValue::Family(f)) => {
                    RefValue::Family(f.scalar_op(*op, s, true))
                }
                (RefValue::Family(a), RefValue::Family(b)) => {
                    RefValue::Family(a.family_op(*op, &b))
                }
            }
        }
        MalExpression::MethodCall {
            receiver,
            method,
            args,
            ..
        } => {
            let RefValue::Family(receiver) =
                interpret(receiver, samples, services, window, discriminator)
            else {
                panic!("reference interpretation called '{method}' on a scalar");
            };

            RefValue::Family(apply_method(
                receiver,
                method,
                args,
                services,
                window,
                discriminator,
            ))
        }
    }
}

fn strings(arg: &MalParameter) -> Vec<&str> {
    match arg {
        MalParameter::StringList(list) => list.iter().map(|s| s.as_ref()).collect(),
        other => panic!("expected a string list, found {other:?}"),
    }
}

fn text(arg: &MalParameter) -> &str {
    match arg {
        MalParameter::Str(s) => s.as_ref(),
        other => panic!("expected a string, found {other:?}"),
    }
}

fn layer(arg: &MalParameter) -> Layer {
    match arg {
        MalParameter::Layer(layer) => *layer,
        other => panic!("expected a layer, found {other:?}"),
    }
}

fn closure(arg: &MalParameter, contract: ClosureContract) -> CompiledClosure {
    match arg {
        MalParameter::Closure(closure) => {
            CompiledClosure::new(contract, closure.clone()).expect("closure satisfies contract")
        }
        other => panic!("expected a closure, found {other:?}"),
    }
}

fn apply_method(
    receiver: SampleFamily,
    method: &str,
    args: &[MalParameter],
    services: &RuntimeServices,
    window: &CounterWindow,
    discriminator: Option<&str>,
) -> SampleFamily {
    match method {
        "sum" => receiver.sum(&strings(&args[0])),
        "max" => receiver.max(&strings(&args[0])),
        "min" => receiver.min(&strings(&args[0])),
        "avg" => receiver.avg(&strings(&args[0])),
        "latest" => receiver.latest(),
        "rate" => receiver
            .rate(text(&args[0]), window, discriminator)
            .expect("reference rate"),
        "increase" => receiver
            .increase(text(&args[0]), window, discriminator)
            .expect("reference increase"),
        "irate" => receiver
            .irate(text(&args[0]), window, discriminator)
            .expect("reference irate"),
        "histogram" => receiver.histogram(),
        "histogram_percentile" => {
            let MalParameter::NumberList(percentiles) = &args[0] else {
                panic!("expected a percentile list");
            };
            receiver
                .histogram_percentile(percentiles)
                .expect("reference percentile")
        }
        "tag" => receiver
            .tag(&closure(&args[0], ClosureContract::TagRewrite), services)
            .expect("reference tag"),
        "filter" => receiver
            .filter(&closure(&args[0], ClosureContract::FilterPredicate), services)
            .expect("reference filter"),
        "tagEqual" => receiver.tag_equal(text(&args[0]), text(&args[1])),
        "tagNotEqual" => receiver.tag_not_equal(text(&args[0]), text(&args[1])),
        "tagMatch" => receiver
            .tag_match(text(&args[0]), text(&args[1]))
            .expect("reference tagMatch"),
        "downsampling" => {
            let MalParameter::Downsampling(downsampling) = &args[0] else {
                panic!("expected a downsampling type");
            };
            receiver.downsampling(*downsampling)
        }
        "service" => receiver.service(&strings(&args[0]), layer(&args[1])),
        "instance" => receiver.instance(&strings(&args[0]), &strings(&args[1]), layer(&args[2])),
        "endpoint" => receiver.endpoint(&strings(&args[0]), &strings(&args[1]), layer(&args[2])),
        other => panic!("reference interpretation does not cover '{other}'"),
    }
}

fn run_compiled(
    rule: &str,
    metric_name: &str,
    samples: &SampleMap,
    discriminator: &str,
) -> SampleFamily {
    let program = transpile_expression("rules.yaml", metric_name, rule, false).unwrap();
    let compiled = CompiledExpression::new(Arc::new(program)).unwrap();
    compiled.run_with_options(
        samples,
        &RuntimeServices::new(),
        &EvalOptions {
            window_discriminator: Some(discriminator.to_string()),
        },
        global_counter_window(),
    )
}

fn run_reference(rule: &str, samples: &SampleMap, discriminator: &str) -> SampleFamily {
    let ast = MalParser::parse_expression("rules.yaml", rule).unwrap();
    match interpret(
        &ast,
        samples,
        &RuntimeServices::new(),
        global_counter_window(),
        Some(discriminator),
    ) {
        RefValue::Family(family) => family,
        RefValue::Scalar(_) => panic!("reference interpretation produced a scalar"),
    }
}

/// Run both paths on the same input, with separate counter-window
/// discriminators so stateful operations do not cross-talk.
fn assert_equivalent(case: &str, rule: &str, samples: &SampleMap) {
    let compiled = run_compiled(rule, "equiv_metric", samples, &format!("{case}-compiled"));
    let reference = run_reference(rule, samples, &format!("{case}-reference"));

    assert_family_eq(&reference, &compiled, 1e-3);
}

#[test]
fn test_equivalence_aggregations() {
    let samples = sample_map(vec![family(
        "http_requests",
        &[
            (&[("svc", "a"), ("status", "200")], 5.0),
            (&[("svc", "a"), ("status", "500")], 3.0),
            (&[("svc", "b"), ("status", "200")], 2.0),
        ],
    )]);

    for (case, rule) in [
        ("sum", "http_requests.sum(['svc']).service(['svc'], Layer.HTTP)"),
        ("avg", "http_requests.avg(['svc']).service(['svc'], Layer.HTTP)"),
        ("max", "http_requests.max(['svc']).service(['svc'], Layer.HTTP)"),
        ("min", "http_requests.min(['svc']).service(['svc'], Layer.HTTP)"),
        (
            "latest",
            "http_requests.latest().sum(['svc', 'status']).service(['svc'], Layer.HTTP)",
        ),
    ] {
        assert_equivalent(case, rule, &samples);
    }
}

#[test]
fn test_equivalence_arithmetic_shapes() {
    let samples = sample_map(vec![
        family("used", &[(&[("host", "a")], 30.0), (&[("host", "b")], 90.0)]),
        family("total", &[(&[("host", "a")], 60.0), (&[("host", "b")], 0.0)]),
    ]);

    for (case, rule) in [
        (
            "family-scalar",
            "(used.sum(['host']) * 100).service(['host'], Layer.GENERAL)",
        ),
        (
            "scalar-family",
            "(100 * used.sum(['host'])).service(['host'], Layer.GENERAL)",
        ),
        (
            "family-family-div",
            "(used.sum(['host']) / total.sum(['host'])).service(['host'], Layer.GENERAL)",
        ),
        (
            "scalar-scalar",
            "(used.sum(['host']) * (3 * 2.5)).service(['host'], Layer.GENERAL)",
        ),
    ] {
        assert_equivalent(case, rule, &samples);
    }
}

#[test]
fn test_equivalence_filters_and_tags() {
    let samples = sample_map(vec![family(
        "reqs",
        &[
            (&[("svc", "a"), ("status", "200")], 5.0),
            (&[("svc", "a"), ("status", "404")], 2.0),
            (&[("svc", "b"), ("status", "500")], 3.0),
        ],
    )]);

    for (case, rule) in [
        (
            "tag-equal",
            "reqs.tagEqual('status', '200').sum(['svc']).service(['svc'], Layer.HTTP)",
        ),
        (
            "tag-not-equal",
            "reqs.tagNotEqual('status', '200').sum(['svc']).service(['svc'], Layer.HTTP)",
        ),
        (
            "tag-match",
            "reqs.tagMatch('status', '4..|5..').sum(['svc']).service(['svc'], Layer.HTTP)",
        ),
        (
            "closure-filter",
            "reqs.filter({ tags -> tags.status == '200' }).sum(['svc']).service(['svc'], Layer.HTTP)",
        ),
        (
            "closure-tag",
            "reqs.tag({ tags -> tags.bucket = tags.status == '200' ? 'ok' : 'err' }).sum(['bucket']).service(['bucket'], Layer.HTTP)",
        ),
    ] {
        assert_equivalent(case, rule, &samples);
    }
}

#[test]
fn test_equivalence_histogram_percentile() {
    let samples = sample_map(vec![family(
        "latency",
        &[
            (&[("le", "0.1")], 10.0),
            (&[("le", "1")], 50.0),
            (&[("le", "+Inf")], 100.0),
        ],
    )]);

    assert_equivalent(
        "histogram",
        "latency.histogram().histogram_percentile([50, 99]).service(['p'], Layer.GENERAL)",
        &samples,
    );
}

#[test]
fn test_equivalence_rate_over_two_batches() {
    let rule = "counter.rate('PT1M').service(['host'], Layer.GENERAL)";

    let first = sample_map(vec![family_at("counter", &[(&[("host", "a")], 100.0)], 0)]);
    let second = sample_map(vec![family_at(
        "counter",
        &[(&[("host", "a")], 130.0)],
        30_000,
    )]);

    // Both paths see the first observation, then compare on the second.
    run_compiled(rule, "rate_metric", &first, "rate2-compiled");
    run_reference(rule, &first, "rate2-reference");

    let compiled = run_compiled(rule, "rate_metric", &second, "rate2-compiled");
    let reference = run_reference(rule, &second, "rate2-reference");

    assert!(!compiled.is_empty());
    assert_family_eq(&reference, &compiled, 1e-3);
    assert!((compiled.get_samples()[0].get_value() - 1.0).abs() < 1e-3);
}

#[test]
fn test_scalar_broadcast_scenario() {
    let samples = sample_map(vec![family(
        "x",
        &[(&[("svc", "a")], 1.0), (&[("svc", "b")], 2.0)],
    )]);

    let result = run_compiled(
        "(x.sum(['svc']) * 100).service(['svc'], Layer.GENERAL)",
        "broadcast_metric",
        &samples,
        "broadcast",
    );

    let mut expected = family("x", &[(&[("svc", "a")], 100.0), (&[("svc", "b")], 200.0)]);
    expected = expected.service(&["svc"], Layer::General);
    assert_family_eq(&expected, &result, 1e-9);
    assert_eq!(
        Some(&ScopeBinding::Service {
            keys: vec!["svc".into()],
            layer: Layer::General,
        }),
        result.get_scope()
    );
}

#[test]
fn test_tag_equal_scenario() {
    let samples = sample_map(vec![family(
        "y",
        &[
            (&[("svc", "a"), ("status", "200")], 5.0),
            (&[("svc", "a"), ("status", "500")], 3.0),
        ],
    )]);

    let result = run_compiled(
        "y.tagEqual('status','200').sum(['svc']).service(['svc'], Layer.HTTP)",
        "tag_equal_metric",
        &samples,
        "tag-equal-scenario",
    );

    assert_eq!(1, result.get_samples().len());
    assert_eq!(labels(&[("svc", "a")]), *result.get_samples()[0].get_labels());
    assert_eq!(5.0, result.get_samples()[0].get_value());
}

#[test]
fn test_histogram_percentile_scenario() {
    let samples = sample_map(vec![family(
        "lat",
        &[
            (&[("le", "0.1")], 10.0),
            (&[("le", "1")], 50.0),
            (&[("le", "+Inf")], 100.0),
        ],
    )]);

    let result = run_compiled(
        "lat.histogram().histogram_percentile([50]).service(['p'], Layer.GENERAL)",
        "percentile_metric",
        &samples,
        "percentile-scenario",
    );

    assert_eq!(1, result.get_samples().len());
    let sample = &result.get_samples()[0];
    assert_eq!("50", sample.get_labels()["p"]);
    assert!((sample.get_value() - 0.55).abs() < 1e-3);
}

#[test]
fn test_rate_counter_reset_scenario() {
    let rule = "c.rate('PT1M').service(['host'], Layer.GENERAL)";

    let first = sample_map(vec![family_at("c", &[(&[("host", "a")], 10.0)], 0)]);
    run_compiled(rule, "reset_metric", &first, "reset-scenario");

    let second = sample_map(vec![family_at("c", &[(&[("host", "a")], 5.0)], 60_000)]);
    let result = run_compiled(rule, "reset_metric", &second, "reset-scenario");

    assert_eq!(1, result.get_samples().len());
    assert_eq!(0.0, result.get_samples()[0].get_value());
}

#[test]
fn test_pure_read_tag_closure_is_identity() {
    let samples = sample_map(vec![family(
        "m",
        &[
            (&[("host", "a"), ("region", "eu")], 1.5),
            (&[("host", "b"), ("region", "us")], 2.5),
        ],
    )]);

    let with_tag = run_compiled(
        "m.tag({ tags -> def r = tags.region }).sum(['host', 'region']).service(['host'], Layer.GENERAL)",
        "identity_metric",
        &samples,
        "identity-tag",
    );
    let without_tag = run_compiled(
        "m.sum(['host', 'region']).service(['host'], Layer.GENERAL)",
        "identity_metric_base",
        &samples,
        "identity-base",
    );

    assert_family_eq(&without_tag, &with_tag, 0.0);
}

#[test]
fn test_unresolved_sample_yields_empty() {
    let samples = sample_map(vec![family("present", &[(&[("svc", "a")], 1.0)])]);

    let result = run_compiled(
        "absent.sum(['svc']).service(['svc'], Layer.GENERAL)",
        "absent_metric",
        &samples,
        "absent",
    );

    assert!(result.is_empty());
    assert_eq!(SampleFamily::empty(), result);
}

#[test]
fn test_downsampling_is_recorded_on_the_result() {
    let samples = sample_map(vec![family("m", &[(&[("svc", "a")], 1.0)])]);

    let result = run_compiled(
        "m.sum(['svc']).service(['svc'], Layer.GENERAL).downsampling(SUM)",
        "downsampling_metric",
        &samples,
        "downsampling",
    );

    assert_eq!(
        Some(DownsamplingType::Sum),
        result.get_context().downsampling
    );
}
