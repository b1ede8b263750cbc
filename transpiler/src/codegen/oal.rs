// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use analysis_engine_model::{DispatcherProgram, MetricProgram, OalFilterOp, OalFunction};

use crate::codegen::GENERATED_HEADER;
use crate::codegen::literals::{boxed_str, oal_literal, str_lit, string_vec};
use crate::codegen::writer::CodeWriter;

/// Render one OAL metric class as a registration source artifact.
pub fn render_oal_metric(program: &MetricProgram) -> String {
    let mut w = CodeWriter::new();

    w.line(GENERATED_HEADER.trim_end());
    w.line("");
    w.line("use analysis_engine_model::*;");
    w.line("use analysis_engine_runtime::ArtifactCatalog;");
    w.line("");
    w.line(&format!("pub(crate) const FQN: &str = {};", str_lit(&program.fqn)));
    w.line("");
    w.open("pub(crate) fn register(catalog: &mut ArtifactCatalog) {");
    w.line("catalog.install_oal_metric(FQN, build());");
    w.close("}");
    w.line("");
    w.open("fn build() -> MetricProgram {");
    w.open("MetricProgram {");
    w.line(&format!(
        "metric_name: {}.to_string(),",
        str_lit(&program.metric_name)
    ));
    w.line("fqn: FQN.to_string(),");
    w.line(&format!(
        "source_name: {}.to_string(),",
        str_lit(&program.source_name)
    ));
    w.line(&format!("scope_id: {},", program.scope_id));
    w.line(&format!("function: {},", function_variant(program.function)));
    let args: Vec<String> = program.args.iter().map(oal_literal).collect();
    w.line(&format!("args: vec![{}],", args.join(", ")));
    match &program.value_field {
        None => w.line("value_field: None,"),
        Some(field) => w.line(&format!("value_field: Some({}),", boxed_str(field))),
    }
    w.line(&format!(
        "entity_fields: {},",
        string_vec(&program.entity_fields)
    ));
    w.open("filters: vec![");
    for filter in &program.filters {
        w.open("OalFilterSpec {");
        w.line(&format!("field: {},", boxed_str(&filter.field)));
        w.line(&format!("op: {},", filter_op_variant(filter.op)));
        w.line(&format!("literal: {},", oal_literal(&filter.literal)));
        w.close("},");
    }
    w.close("],");
    w.close("}");
    w.close("}");

    w.finish()
}

/// Render one OAL dispatcher class as a registration source artifact.
pub fn render_oal_dispatcher(program: &DispatcherProgram) -> String {
    let mut w = CodeWriter::new();

    w.line(GENERATED_HEADER.trim_end());
    w.line("");
    w.line("use analysis_engine_model::*;");
    w.line("use analysis_engine_runtime::ArtifactCatalog;");
    w.line("");
    w.line(&format!("pub(crate) const FQN: &str = {};", str_lit(&program.fqn)));
    w.line("");
    w.open("pub(crate) fn register(catalog: &mut ArtifactCatalog) {");
    w.line("catalog.install_oal_dispatcher(FQN, build());");
    w.close("}");
    w.line("");
    w.open("fn build() -> DispatcherProgram {");
    w.open("DispatcherProgram {");
    w.line(&format!(
        "source_name: {}.to_string(),",
        str_lit(&program.source_name)
    ));
    w.line("fqn: FQN.to_string(),");
    w.line(&format!("scope_id: {},", program.scope_id));
    let metrics: Vec<String> = program
        .metrics
        .iter()
        .map(|m| format!("{}.to_string()", str_lit(m)))
        .collect();
    w.line(&format!("metrics: vec![{}],", metrics.join(", ")));
    w.close("}");
    w.close("}");

    w.finish()
}

fn function_variant(function: OalFunction) -> String {
    format!("OalFunction::{function:?}")
}

fn filter_op_variant(op: OalFilterOp) -> String {
    format!("OalFilterOp::{op:?}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::oal_emitter::OalEmitter;

    #[test]
    fn test_rendering_is_deterministic() {
        let mut emitter = OalEmitter::new();
        emitter
            .emit_file(
                "core.oal",
                "endpoint_avg = from(Endpoint.latency).longAvg() filter status == true",
            )
            .unwrap();
        let emission = emitter.finish();

        let metric = render_oal_metric(&emission.metrics[0]);
        assert_eq!(metric, render_oal_metric(&emission.metrics[0]));
        assert!(metric.contains("oal.rt.metrics.EndpointAvg"));
        assert!(metric.contains("OalFunction::LongAvg"));
        assert!(metric.contains("OalFilterOp::Equal"));

        let dispatcher = render_oal_dispatcher(&emission.dispatchers[0]);
        assert!(dispatcher.contains("oal.rt.dispatcher.EndpointDispatcher"));
        assert!(dispatcher.contains("\"endpoint_avg\".to_string()"));
    }
}
