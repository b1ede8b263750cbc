// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use analysis_engine_model::{
    ExtractorStep, FilterStep, GStringPart, LalProgram, MetricSpec, SampledTraceSpec,
    SamplerSpec, lal_expression_fqn,
};

use crate::codegen::GENERATED_HEADER;
use crate::codegen::literals::{boxed_str, expression, str_lit};
use crate::codegen::writer::CodeWriter;

/// Render one compiled LAL script as a registration source artifact.
pub fn render_lal_script(program: &LalProgram, index: usize) -> String {
    let fqn = lal_expression_fqn(index);
    let mut w = CodeWriter::new();

    w.line(GENERATED_HEADER.trim_end());
    w.line("");
    w.line("use analysis_engine_model::*;");
    w.line("use analysis_engine_runtime::ArtifactCatalog;");
    w.line("");
    w.line(&format!("pub(crate) const FQN: &str = {};", str_lit(&fqn)));
    w.line(&format!(
        "pub(crate) const DSL_HASH: &str = {};",
        str_lit(&program.dsl_hash)
    ));
    w.line("");
    w.open("pub(crate) fn register(catalog: &mut ArtifactCatalog) {");
    w.line("catalog.install_lal_script(FQN, build());");
    w.close("}");
    w.line("");
    w.open("fn build() -> LalProgram {");
    w.open("LalProgram {");
    w.line("dsl_hash: DSL_HASH.to_string(),");
    w.open("script: LalScript::new(vec![");
    for filter in program.script.get_filters() {
        w.open("FilterBlock::new(");
        w.open("vec![");
        for step in filter.get_steps() {
            write_filter_step(&mut w, step);
        }
        w.close("],");
        w.line("SourceLocation::generated(),");
        w.close("),");
    }
    w.close("]),");
    w.close("}");
    w.close("}");

    w.finish()
}

fn write_filter_step(w: &mut CodeWriter, step: &FilterStep) {
    match step {
        FilterStep::Json { .. } => {
            w.line("FilterStep::Json { location: SourceLocation::generated() },");
        }
        FilterStep::Text { regexp, .. } => {
            w.open("FilterStep::Text {");
            w.line(&format!("regexp: {},", boxed_str(regexp)));
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
        FilterStep::Extractor { steps, .. } => {
            w.open("FilterStep::Extractor {");
            w.open("steps: vec![");
            for inner in steps {
                write_extractor_step(w, inner);
            }
            w.close("],");
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
        FilterStep::Sink { sampler, .. } => {
            w.open("FilterStep::Sink {");
            match sampler {
                None => w.line("sampler: None,"),
                Some(sampler) => write_sampler(w, sampler),
            }
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
        FilterStep::Abort { .. } => {
            w.line("FilterStep::Abort { location: SourceLocation::generated() },");
        }
        FilterStep::If {
            branches,
            else_steps,
            ..
        } => {
            w.open("FilterStep::If {");
            w.open("branches: vec![");
            for branch in branches {
                w.open("LalConditionalBranch::new(");
                w.line(&format!("{},", expression(branch.get_condition())));
                w.open("vec![");
                for inner in branch.get_steps() {
                    write_filter_step(w, inner);
                }
                w.close("],");
                w.close("),");
            }
            w.close("],");
            w.open("else_steps: vec![");
            for inner in else_steps {
                write_filter_step(w, inner);
            }
            w.close("],");
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
    }
}

fn write_extractor_step(w: &mut CodeWriter, step: &ExtractorStep) {
    match step {
        ExtractorStep::Tag { key, value, .. } => {
            w.open("ExtractorStep::Tag {");
            w.line(&format!("key: {},", boxed_str(key)));
            w.line(&format!("value: {},", expression(value)));
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
        ExtractorStep::Metric { spec, .. } => {
            w.open("ExtractorStep::Metric {");
            write_metric_spec(w, spec);
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
        ExtractorStep::SampledTrace { spec, .. } => {
            w.open("ExtractorStep::SampledTrace {");
            write_sampled_trace_spec(w, spec);
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
        ExtractorStep::If {
            branches,
            else_steps,
            ..
        } => {
            w.open("ExtractorStep::If {");
            w.open("branches: vec![");
            for branch in branches {
                w.open("LalExtractorBranch::new(");
                w.line(&format!("{},", expression(branch.get_condition())));
                w.open("vec![");
                for inner in branch.get_steps() {
                    write_extractor_step(w, inner);
                }
                w.close("],");
                w.close("),");
            }
            w.close("],");
            w.open("else_steps: vec![");
            for inner in else_steps {
                write_extractor_step(w, inner);
            }
            w.close("],");
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
    }
}

fn write_metric_spec(w: &mut CodeWriter, spec: &MetricSpec) {
    w.open("spec: MetricSpec {");
    w.line(&format!("name: {},", expression(&spec.name)));
    match &spec.timestamp {
        None => w.line("timestamp: None,"),
        Some(timestamp) => w.line(&format!("timestamp: Some({}),", expression(timestamp))),
    }
    w.open("labels: vec![");
    for (key, value) in &spec.labels {
        w.line(&format!("({}, {}),", boxed_str(key), expression(value)));
    }
    w.close("],");
    w.line(&format!("value: {},", expression(&spec.value)));
    w.close("},");
}

fn write_sampled_trace_spec(w: &mut CodeWriter, spec: &SampledTraceSpec) {
    w.open("spec: SampledTraceSpec {");
    match &spec.latency {
        None => w.line("latency: None,"),
        Some(latency) => w.line(&format!("latency: Some({}),", expression(latency))),
    }
    match &spec.uri {
        None => w.line("uri: None,"),
        Some(uri) => w.line(&format!("uri: Some({}),", expression(uri))),
    }
    match &spec.reason {
        None => w.line("reason: None,"),
        Some(reason) => w.line(&format!("reason: Some({}),", expression(reason))),
    }
    w.close("},");
}

fn write_sampler(w: &mut CodeWriter, sampler: &SamplerSpec) {
    w.open("sampler: Some(SamplerSpec {");
    w.open("rate_limit_key: GString::new(vec![");
    for part in sampler.rate_limit_key.get_parts() {
        match part {
            GStringPart::Literal(text) => {
                w.line(&format!("GStringPart::Literal({}),", boxed_str(text)));
            }
            GStringPart::Expression(e) => {
                w.line(&format!("GStringPart::Expression({}),", expression(e)));
            }
        }
    }
    w.close("]),");
    w.line(&format!("rpm: {},", sampler.rpm));
    w.close("}),");
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lal_transpiler::transpile_lal_script;

    #[test]
    fn test_rendering_is_deterministic() {
        let program = transpile_lal_script(
            "default.yaml",
            r#"filter {
                json {}
                extractor {
                    tag status: parsed.status
                    metric {
                        name "log_count"
                        labels service: log.service
                        value 1
                    }
                }
                sink {
                    sampler {
                        rateLimit("${log.service}") { rpm 600 }
                    }
                }
            }"#,
        )
        .unwrap();

        let first = render_lal_script(&program, 0);
        let second = render_lal_script(&program, 0);

        assert_eq!(first, second);
        assert!(first.contains("lal.rt.LalExpr_0"));
        assert!(first.contains(&program.dsl_hash));
        assert!(first.contains("FilterStep::Json"));
        assert!(first.contains("rpm: 600,"));
    }
}
