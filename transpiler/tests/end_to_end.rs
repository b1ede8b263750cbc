// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

//! Build a full distribution, write it to disk, install the compiled
//! artifacts, bootstrap the runtime from the manifests, and drive the three
//! pipelines end to end.

mod common;

use parking_lot::Mutex;

use analysis_engine_model::{
    MeterGroupData, OalFunction, RuleDialect, from_canonical_json, lal_expression_fqn,
    mal_expression_fqn, mal_filter_fqn, to_canonical_json,
};
use analysis_engine_runtime::{
    AnalysisRuntime, ArtifactCatalog, DerivedMetric, DisabledSources, Distribution, LoadError,
    LogPipeline, LogRecord, MeterPipeline, RuntimeServices, Sample, SampleFamily, ScopeRegistry,
    Source, Value,
};
use analysis_engine_transpiler::{DistributionBuilder, DistributionOutput};

use common::labels;

// The scope registry and disable set are process-wide; bootstrap-driven
// tests take this guard and reset them first.
static BOOTSTRAP_GUARD: Mutex<()> = Mutex::new(());

const OAL_SCRIPT: &str = "\
endpoint_avg = from(Endpoint.latency).longAvg()
endpoint_success = from(Endpoint.*).count() filter status == true
service_avg = from(Service.latency).longAvg()
disable(Service)
";

const VM_RULES: &str = r#"
metricPrefix: meter_vm
expSuffix: service(['host'], Layer.GENERAL)
filter: "{ tags -> tags.job == 'vm' }"
metricsRules:
  - name: cpu
    exp: cpu_seconds.sum(['host']) * 100
"#;

const LOG_RULES: &str = r#"
rules:
  - name: access
    dsl: |
      filter {
        text {
          regexp "(?P<ip>\\S+) \\S+ \\S+ \"(?P<verb>\\S+) (?P<uri>\\S+) HTTP/\\S+\" (?P<status>\\d+) (?P<size>\\d+)"
        }
        extractor {
          tag status: parsed.status
          tag verb: parsed.verb
          metric {
            name "access_count"
            labels service: log.service, status: parsed.status
            value 1
          }
        }
        sink {
          sampler {
            rateLimit("${log.service}") { rpm 1 }
          }
        }
      }
  - name: guard
    dsl: |
      filter {
        json {}
        if (parsed.code < 400 && !parsed.flags) abort {}
        extractor {
          tag code: parsed.code
        }
      }
"#;

fn build_output() -> DistributionOutput {
    let mut builder = DistributionBuilder::new();
    builder.add_oal_file("core.oal", OAL_SCRIPT).unwrap();
    builder
        .add_meter_group("vm", "vm.yaml", VM_RULES, RuleDialect::Standard)
        .unwrap();
    builder
        .add_log_group("default", "default.yaml", LOG_RULES)
        .unwrap();
    builder.build().unwrap()
}

fn install(output: &DistributionOutput) -> ArtifactCatalog {
    let mut catalog = ArtifactCatalog::new();

    for program in &output.mal_programs {
        catalog.install_mal_expression(&mal_expression_fqn(&program.metric_name), program.clone());
    }
    for (index, program) in output.filter_programs.iter().enumerate() {
        catalog.install_mal_filter(&mal_filter_fqn(index), program.clone());
    }
    for (index, program) in output.lal_programs.iter().enumerate() {
        catalog.install_lal_script(&lal_expression_fqn(index), program.clone());
    }
    for metric in &output.oal.metrics {
        catalog.install_oal_metric(&metric.fqn, metric.clone());
    }
    for dispatcher in &output.oal.dispatchers {
        catalog.install_oal_dispatcher(&dispatcher.fqn, dispatcher.clone());
    }

    catalog
}

fn bootstrap(dir: &std::path::Path) -> (AnalysisRuntime, DistributionOutput) {
    ScopeRegistry::reset_for_tests();
    DisabledSources::reset_for_tests();

    let output = build_output();
    output.write_to(dir).unwrap();

    let catalog = install(&output);
    let runtime = AnalysisRuntime::bootstrap(
        &Distribution::open(dir),
        &catalog,
        RuntimeServices::new(),
    )
    .unwrap();

    (runtime, output)
}

#[test]
fn test_full_distribution_lifecycle() {
    let _guard = BOOTSTRAP_GUARD.lock();
    let dir = tempfile::tempdir().unwrap();
    let (runtime, output) = bootstrap(dir.path());

    // Scope registry resolved from the manifest.
    assert_eq!(Box::from("Endpoint"), ScopeRegistry::name_of(3).unwrap());
    assert!(
        ScopeRegistry::source_fields(3)
            .unwrap()
            .contains(&Box::from("latency"))
    );
    assert!(DisabledSources::is_disabled("Service"));

    // --- OAL dispatch ---
    let source = Source::new("Endpoint", 2_000)
        .with_field("name", Value::Str("/api/orders".into()))
        .with_field("serviceName", Value::Str("order-service".into()))
        .with_field("latency", Value::Integer(42))
        .with_field("status", Value::Boolean(true));

    let mut derived: Vec<DerivedMetric> = Vec::new();
    runtime.dispatch(&source, &mut |metric: DerivedMetric| derived.push(metric));

    assert_eq!(2, derived.len());
    let avg = derived.iter().find(|m| m.metric_name == "endpoint_avg").unwrap();
    assert_eq!(OalFunction::LongAvg, avg.function);
    assert_eq!(42.0, avg.value);
    assert_eq!(
        vec![
            ("serviceName".to_string(), "order-service".to_string()),
            ("name".to_string(), "/api/orders".to_string()),
        ],
        avg.entity
    );

    // The disabled Service dispatcher stays silent.
    let service_source = Source::new("Service", 2_000)
        .with_field("name", Value::Str("order-service".into()))
        .with_field("latency", Value::Integer(10));
    let mut service_derived: Vec<DerivedMetric> = Vec::new();
    runtime.dispatch(&service_source, &mut |metric: DerivedMetric| {
        service_derived.push(metric)
    });
    assert!(service_derived.is_empty());

    // --- Meter pipeline ---
    let pipeline = MeterPipeline::new(&runtime).with_window_discriminator("e2e-meter");
    let filter = runtime.filter_for("{ tags -> tags.job == 'vm' }").unwrap();

    let raw = vec![
        Sample::new("cpu_seconds", labels(&[("host", "a"), ("job", "vm")]), 0.5, 1_000),
        Sample::new("cpu_seconds", labels(&[("host", "b"), ("job", "db")]), 0.9, 1_000),
    ];
    let sample_map = pipeline.build_sample_map(raw, Some(&filter));

    let mut results: Vec<(String, SampleFamily)> = Vec::new();
    pipeline
        .process(
            &["meter_vm_cpu"],
            &sample_map,
            &mut |name: &str, family: &SampleFamily| {
                results.push((name.to_string(), family.clone()))
            },
        )
        .unwrap();

    assert_eq!(1, results.len());
    let (name, family) = &results[0];
    assert_eq!("meter_vm_cpu", name);
    // host b was filtered out; host a is scaled by 100.
    assert_eq!(1, family.get_samples().len());
    assert_eq!(50.0, family.get_samples()[0].get_value());
    assert!(family.get_scope().is_some());

    // Lazy lookups are cached and strict.
    assert!(runtime.parse_metric("meter_vm_cpu", "").is_ok());
    assert!(matches!(
        runtime.parse_metric("nope", ""),
        Err(LoadError::UnknownMetric(_))
    ));
    match runtime.filter_for("{ tags -> tags.other == 'x' }") {
        Err(LoadError::UnknownFilterLiteral { known, .. }) => {
            assert_eq!(vec!["{ tags -> tags.job == 'vm' }".to_string()], known);
        }
        other => panic!("expected an unknown-literal error, got {other:?}"),
    }

    // --- Log pipeline: tag extraction + sampler ---
    let log_pipeline = LogPipeline::new(&runtime);
    let access_dsl = &output.log_groups[0].rules.rules[0].dsl;
    let script = log_pipeline.script_for(access_dsl).unwrap();

    let record = LogRecord::new(
        "order-service",
        "192.168.1.1 - frank \"GET /x HTTP/1.1\" 200 1234",
        60_000,
    );
    let result = log_pipeline.process(&script, record, None);

    assert!(result.kept);
    assert_eq!(Some(&"200".to_string()), result.record.tags.get("status"));
    assert_eq!(Some(&"GET".to_string()), result.record.tags.get("verb"));
    assert_eq!(1, result.metrics.len());
    assert_eq!("access_count", result.metrics[0].get_name());
    assert_eq!(1.0, result.metrics[0].get_value());
    assert_eq!(
        Some(&"200".to_string()),
        result.metrics[0].get_labels().get("status")
    );

    // Second record in the same minute for the same service trips the
    // one-per-minute rate limit.
    let record = LogRecord::new(
        "order-service",
        "192.168.1.1 - frank \"GET /y HTTP/1.1\" 200 99",
        70_000,
    );
    let result = log_pipeline.process(&script, record, None);
    assert!(!result.kept);

    // A new minute admits again.
    let record = LogRecord::new(
        "order-service",
        "192.168.1.1 - frank \"GET /z HTTP/1.1\" 200 99",
        130_000,
    );
    assert!(log_pipeline.process(&script, record, None).kept);

    // --- Log pipeline: abort branch ---
    let guard_dsl = &output.log_groups[0].rules.rules[1].dsl;
    let script = log_pipeline.script_for(guard_dsl).unwrap();

    let record = LogRecord::new("svc", r#"{"code": 200, "flags": ""}"#, 1_000);
    let result = log_pipeline.process(&script, record, None);
    assert!(!result.kept);
    assert!(result.record.tags.is_empty());
    assert!(result.metrics.is_empty());

    let record = LogRecord::new("svc", r#"{"code": 503, "flags": ""}"#, 1_000);
    let result = log_pipeline.process(&script, record, None);
    assert!(result.kept);
    assert_eq!(Some(&"503".to_string()), result.record.tags.get("code"));

    // Unknown DSL text is a configuration error.
    assert!(matches!(
        runtime.load_log_script("filter { json {} abort {} }"),
        Err(LoadError::UnknownScript(_))
    ));

    // --- config-data round trip from disk ---
    let json = std::fs::read_to_string(dir.path().join("config-data/meter/vm.json")).unwrap();
    let reloaded: MeterGroupData = from_canonical_json(&json).unwrap();
    assert_eq!(json, to_canonical_json(&reloaded).unwrap());
}

#[test]
fn test_bootstrap_fails_on_missing_artifact() {
    let _guard = BOOTSTRAP_GUARD.lock();
    ScopeRegistry::reset_for_tests();
    DisabledSources::reset_for_tests();

    let dir = tempfile::tempdir().unwrap();
    let output = build_output();
    output.write_to(dir.path()).unwrap();

    // An empty catalog cannot satisfy the manifests.
    let error = AnalysisRuntime::bootstrap(
        &Distribution::open(dir.path()),
        &ArtifactCatalog::new(),
        RuntimeServices::new(),
    )
    .unwrap_err();

    assert!(matches!(error, LoadError::UnresolvedArtifact(_)));
}
