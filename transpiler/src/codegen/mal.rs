// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use analysis_engine_model::{
    ArithmeticMode, ArithmeticOp, FilterProgram, MalProgram, OpArg, OpNode, RuntimeOp,
    ScopeBinding, mal_expression_fqn, mal_filter_fqn,
};

use crate::codegen::GENERATED_HEADER;
use crate::codegen::literals::{
    boxed_str, contract_variant, downsampling_variant, f64_lit, int_vec, layer_variant,
    retag_variant, str_lit, string_vec, write_closure,
};
use crate::codegen::writer::CodeWriter;

/// Render one compiled MAL expression as a registration source artifact.
pub fn render_mal_expression(program: &MalProgram) -> String {
    let fqn = mal_expression_fqn(&program.metric_name);
    let mut w = CodeWriter::new();

    w.line(GENERATED_HEADER.trim_end());
    w.line("");
    w.line("use analysis_engine_model::*;");
    w.line("use analysis_engine_runtime::ArtifactCatalog;");
    w.line("");
    w.line(&format!("pub(crate) const FQN: &str = {};", str_lit(&fqn)));
    w.line("");
    w.open("pub(crate) fn register(catalog: &mut ArtifactCatalog) {");
    w.line("catalog.install_mal_expression(FQN, build());");
    w.close("}");
    w.line("");
    w.open("fn build() -> MalProgram {");
    w.open("MalProgram {");
    w.line(&format!(
        "metric_name: {}.to_string(),",
        str_lit(&program.metric_name)
    ));
    w.line(&format!(
        "composed_expression: {}.to_string(),",
        str_lit(&program.composed_expression)
    ));
    w.line(&format!(
        "expression_hash: {}.to_string(),",
        str_lit(&program.expression_hash)
    ));
    w.line(&format!("init: {},", program.init));
    write_node_field(&mut w, "root", &program.root);
    w.open("closures: vec![");
    for closure in &program.closures {
        w.open("ClosureProgram {");
        w.line(&format!("index: {},", closure.index));
        w.line(&format!("contract: {},", contract_variant(closure.contract)));
        w.open("closure: {");
        write_closure(&mut w, &closure.closure);
        w.close("},");
        w.close("},");
    }
    w.close("],");
    write_meta(&mut w, program);
    w.close("}");
    w.close("}");

    w.finish()
}

/// Render one compiled filter literal as a registration source artifact.
pub fn render_mal_filter(program: &FilterProgram, index: usize) -> String {
    let fqn = mal_filter_fqn(index);
    let mut w = CodeWriter::new();

    w.line(GENERATED_HEADER.trim_end());
    w.line("");
    w.line("use analysis_engine_model::*;");
    w.line("use analysis_engine_runtime::ArtifactCatalog;");
    w.line("");
    w.line(&format!("pub(crate) const FQN: &str = {};", str_lit(&fqn)));
    w.line("");
    w.open("pub(crate) fn register(catalog: &mut ArtifactCatalog) {");
    w.line("catalog.install_mal_filter(FQN, build());");
    w.close("}");
    w.line("");
    w.open("fn build() -> FilterProgram {");
    w.open("FilterProgram {");
    w.line(&format!(
        "literal: {}.to_string(),",
        str_lit(&program.literal)
    ));
    w.open("closure: {");
    write_closure(&mut w, &program.closure);
    w.close("},");
    w.close("}");
    w.close("}");

    w.finish()
}

fn write_node_field(w: &mut CodeWriter, field: &str, node: &OpNode) {
    w.open(&format!("{field}: {{"));
    write_node(w, node);
    w.close("},");
}

fn write_node(w: &mut CodeWriter, node: &OpNode) {
    match node {
        OpNode::SampleRef { name } => {
            w.line(&format!("OpNode::SampleRef {{ name: {} }}", boxed_str(name)));
        }
        OpNode::Scalar { value } => {
            w.line(&format!("OpNode::Scalar {{ value: {} }}", f64_lit(*value)));
        }
        OpNode::Call { receiver, op, args } => {
            w.open("OpNode::Call {");
            w.open("receiver: Box::new({");
            write_node(w, receiver);
            w.close("}),");
            w.line(&format!("op: {},", op_variant(*op)));
            let rendered: Vec<String> = args.iter().map(op_arg).collect();
            w.line(&format!("args: vec![{}],", rendered.join(", ")));
            w.close("}");
        }
        OpNode::Arithmetic {
            op,
            mode,
            left,
            right,
        } => {
            w.open("OpNode::Arithmetic {");
            w.line(&format!("op: {},", arithmetic_variant(*op)));
            w.line(&format!("mode: {},", mode_variant(*mode)));
            w.open("left: Box::new({");
            write_node(w, left);
            w.close("}),");
            w.open("right: Box::new({");
            write_node(w, right);
            w.close("}),");
            w.close("}");
        }
    }
}

fn write_meta(w: &mut CodeWriter, program: &MalProgram) {
    let meta = &program.meta;

    w.open("meta: ExpressionMeta {");
    match &meta.scope {
        None => w.line("scope: None,"),
        Some(scope) => {
            w.open("scope: Some({");
            write_scope(w, scope);
            w.close("}),");
        }
    }
    w.line(&format!(
        "aggregation_labels: {},",
        string_vec(&meta.aggregation_labels)
    ));
    match meta.downsampling {
        None => w.line("downsampling: None,"),
        Some(d) => w.line(&format!("downsampling: Some({}),", downsampling_variant(d))),
    }
    w.line(&format!("histogram: {},", meta.histogram));
    w.line(&format!("percentiles: {},", int_vec(&meta.percentiles)));
    w.close("},");
}

fn write_scope(w: &mut CodeWriter, scope: &ScopeBinding) {
    match scope {
        ScopeBinding::Service { keys, layer } => {
            w.open("ScopeBinding::Service {");
            w.line(&format!("keys: {},", string_vec(keys)));
            w.line(&format!("layer: {},", layer_variant(*layer)));
            w.close("}");
        }
        ScopeBinding::Instance {
            service_keys,
            instance_keys,
            layer,
        } => {
            w.open("ScopeBinding::Instance {");
            w.line(&format!("service_keys: {},", string_vec(service_keys)));
            w.line(&format!("instance_keys: {},", string_vec(instance_keys)));
            w.line(&format!("layer: {},", layer_variant(*layer)));
            w.close("}");
        }
        ScopeBinding::Endpoint {
            service_keys,
            endpoint_keys,
            layer,
        } => {
            w.open("ScopeBinding::Endpoint {");
            w.line(&format!("service_keys: {},", string_vec(service_keys)));
            w.line(&format!("endpoint_keys: {},", string_vec(endpoint_keys)));
            w.line(&format!("layer: {},", layer_variant(*layer)));
            w.close("}");
        }
        ScopeBinding::ServiceRelation {
            source_keys,
            dest_keys,
            layer,
        } => {
            w.open("ScopeBinding::ServiceRelation {");
            w.line(&format!("source_keys: {},", string_vec(source_keys)));
            w.line(&format!("dest_keys: {},", string_vec(dest_keys)));
            w.line(&format!("layer: {},", layer_variant(*layer)));
            w.close("}");
        }
        ScopeBinding::InstanceRelation {
            source_keys,
            dest_keys,
            layer,
        } => {
            w.open("ScopeBinding::InstanceRelation {");
            w.line(&format!("source_keys: {},", string_vec(source_keys)));
            w.line(&format!("dest_keys: {},", string_vec(dest_keys)));
            w.line(&format!("layer: {},", layer_variant(*layer)));
            w.close("}");
        }
        ScopeBinding::EndpointRelation {
            source_keys,
            dest_keys,
            layer,
        } => {
            w.open("ScopeBinding::EndpointRelation {");
            w.line(&format!("source_keys: {},", string_vec(source_keys)));
            w.line(&format!("dest_keys: {},", string_vec(dest_keys)));
            w.line(&format!("layer: {},", layer_variant(*layer)));
            w.close("}");
        }
        ScopeBinding::Process {
            service_keys,
            instance_keys,
            process_keys,
            layer,
        } => {
            w.open("ScopeBinding::Process {");
            w.line(&format!("service_keys: {},", string_vec(service_keys)));
            w.line(&format!("instance_keys: {},", string_vec(instance_keys)));
            w.line(&format!("process_keys: {},", string_vec(process_keys)));
            w.line(&format!("layer: {},", layer_variant(*layer)));
            w.close("}");
        }
    }
}

fn op_arg(arg: &OpArg) -> String {
    match arg {
        OpArg::Double(value) => format!("OpArg::Double({})", f64_lit(*value)),
        OpArg::Str(text) => format!("OpArg::Str({})", boxed_str(text)),
        OpArg::StringList(list) => format!("OpArg::StringList({})", string_vec(list)),
        OpArg::IntList(list) => format!("OpArg::IntList({})", int_vec(list)),
        OpArg::Layer(layer) => format!("OpArg::Layer({})", layer_variant(*layer)),
        OpArg::K8sRetagType(retag) => format!("OpArg::K8sRetagType({})", retag_variant(*retag)),
        OpArg::Downsampling(d) => format!("OpArg::Downsampling({})", downsampling_variant(*d)),
        OpArg::ClosureRef(index) => format!("OpArg::ClosureRef({index})"),
    }
}

fn op_variant(op: RuntimeOp) -> String {
    format!("RuntimeOp::{op:?}")
}

fn arithmetic_variant(op: ArithmeticOp) -> String {
    format!("ArithmeticOp::{op:?}")
}

fn mode_variant(mode: ArithmeticMode) -> String {
    format!("ArithmeticMode::{mode:?}")
}
