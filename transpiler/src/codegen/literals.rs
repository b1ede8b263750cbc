// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use analysis_engine_model::{
    AssignmentTarget, BinaryOp, Closure, ClosureContract, ClosureExpression, ClosureStatement,
    DownsamplingType, K8sRetagType, Layer, OalLiteral, UnaryOp,
};

use crate::codegen::writer::CodeWriter;

/// A Rust string literal for arbitrary text.
pub(crate) fn str_lit(text: &str) -> String {
    format!("{text:?}")
}

/// A `Box<str>` expression.
pub(crate) fn boxed_str(text: &str) -> String {
    format!("{}.into()", str_lit(text))
}

pub(crate) fn f64_lit(value: f64) -> String {
    if value == f64::INFINITY {
        "f64::INFINITY".to_string()
    } else if value == f64::NEG_INFINITY {
        "f64::NEG_INFINITY".to_string()
    } else if value.is_nan() {
        "f64::NAN".to_string()
    } else {
        // `{:?}` always keeps a decimal point, so the literal stays an f64.
        format!("{value:?}")
    }
}

pub(crate) fn string_vec(entries: &[Box<str>]) -> String {
    let rendered: Vec<String> = entries.iter().map(|e| boxed_str(e)).collect();
    format!("vec![{}]", rendered.join(", "))
}

pub(crate) fn int_vec(entries: &[i64]) -> String {
    let rendered: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
    format!("vec![{}]", rendered.join(", "))
}

pub(crate) fn layer_variant(layer: Layer) -> &'static str {
    match layer {
        Layer::Undefined => "Layer::Undefined",
        Layer::General => "Layer::General",
        Layer::Http => "Layer::Http",
        Layer::Rpc => "Layer::Rpc",
        Layer::Database => "Layer::Database",
        Layer::Mysql => "Layer::Mysql",
        Layer::Postgresql => "Layer::Postgresql",
        Layer::Redis => "Layer::Redis",
        Layer::Cache => "Layer::Cache",
        Layer::Mq => "Layer::Mq",
        Layer::OsLinux => "Layer::OsLinux",
        Layer::OsWindows => "Layer::OsWindows",
        Layer::K8s => "Layer::K8s",
        Layer::Mesh => "Layer::Mesh",
        Layer::Faas => "Layer::Faas",
    }
}

pub(crate) fn retag_variant(retag: K8sRetagType) -> &'static str {
    match retag {
        K8sRetagType::Pod2Service => "K8sRetagType::Pod2Service",
    }
}

pub(crate) fn downsampling_variant(downsampling: DownsamplingType) -> &'static str {
    match downsampling {
        DownsamplingType::Avg => "DownsamplingType::Avg",
        DownsamplingType::Sum => "DownsamplingType::Sum",
        DownsamplingType::Latest => "DownsamplingType::Latest",
    }
}

pub(crate) fn contract_variant(contract: ClosureContract) -> &'static str {
    match contract {
        ClosureContract::TagRewrite => "ClosureContract::TagRewrite",
        ClosureContract::FilterPredicate => "ClosureContract::FilterPredicate",
        ClosureContract::Decorate => "ClosureContract::Decorate",
        ClosureContract::PerElement => "ClosureContract::PerElement",
        ClosureContract::PropertiesExtractor => "ClosureContract::PropertiesExtractor",
    }
}

pub(crate) fn oal_literal(literal: &OalLiteral) -> String {
    match literal {
        OalLiteral::Boolean(b) => format!("OalLiteral::Boolean({b})"),
        OalLiteral::Number(n) => format!("OalLiteral::Number({})", f64_lit(*n)),
        OalLiteral::Str(s) => format!("OalLiteral::Str({}.to_string())", str_lit(s)),
        OalLiteral::List(entries) => {
            let rendered: Vec<String> = entries.iter().map(oal_literal).collect();
            format!("OalLiteral::List(vec![{}])", rendered.join(", "))
        }
    }
}

fn unary_variant(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "UnaryOp::Not",
        UnaryOp::Negate => "UnaryOp::Negate",
    }
}

fn binary_variant(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "BinaryOp::Add",
        BinaryOp::Subtract => "BinaryOp::Subtract",
        BinaryOp::Multiply => "BinaryOp::Multiply",
        BinaryOp::Divide => "BinaryOp::Divide",
        BinaryOp::Equal => "BinaryOp::Equal",
        BinaryOp::NotEqual => "BinaryOp::NotEqual",
        BinaryOp::GreaterThan => "BinaryOp::GreaterThan",
        BinaryOp::GreaterThanOrEqual => "BinaryOp::GreaterThanOrEqual",
        BinaryOp::LessThan => "BinaryOp::LessThan",
        BinaryOp::LessThanOrEqual => "BinaryOp::LessThanOrEqual",
        BinaryOp::And => "BinaryOp::And",
        BinaryOp::Or => "BinaryOp::Or",
    }
}

/// Render a closure as a `Closure::new(…)` constructor call, one statement
/// per line, generated locations throughout.
pub(crate) fn write_closure(w: &mut CodeWriter, closure: &Closure) {
    w.open("Closure::new(");
    w.line(&format!("{},", string_vec(closure.get_params())));
    w.open("vec![");
    for statement in closure.get_body() {
        write_statement(w, statement);
    }
    w.close("],");
    w.line("SourceLocation::generated(),");
    w.close(")");
}

fn write_statement(w: &mut CodeWriter, statement: &ClosureStatement) {
    match statement {
        ClosureStatement::Declare { name, value, .. } => {
            w.open("ClosureStatement::Declare {");
            w.line(&format!("name: {},", boxed_str(name)));
            w.line(&format!("value: {},", expression(value)));
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
        ClosureStatement::Assign { target, value, .. } => {
            w.open("ClosureStatement::Assign {");
            match target {
                AssignmentTarget::Variable { name } => {
                    w.line(&format!(
                        "target: AssignmentTarget::Variable {{ name: {} }},",
                        boxed_str(name)
                    ));
                }
                AssignmentTarget::Index { receiver, key } => {
                    w.open("target: AssignmentTarget::Index {");
                    w.line(&format!("receiver: {},", expression(receiver)));
                    w.line(&format!("key: {},", expression(key)));
                    w.close("},");
                }
                AssignmentTarget::Property { receiver, name } => {
                    w.open("target: AssignmentTarget::Property {");
                    w.line(&format!("receiver: {},", expression(receiver)));
                    w.line(&format!("name: {},", boxed_str(name)));
                    w.close("},");
                }
            }
            w.line(&format!("value: {},", expression(value)));
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
        ClosureStatement::Return { value, .. } => {
            w.open("ClosureStatement::Return {");
            match value {
                Some(value) => w.line(&format!("value: Some({}),", expression(value))),
                None => w.line("value: None,"),
            }
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
        ClosureStatement::If {
            branches,
            else_body,
            ..
        } => {
            w.open("ClosureStatement::If {");
            w.open("branches: vec![");
            for branch in branches {
                w.open("ConditionalBranch::new(");
                w.line(&format!("{},", expression(branch.get_condition())));
                w.open("vec![");
                for inner in branch.get_body() {
                    write_statement(w, inner);
                }
                w.close("],");
                w.close("),");
            }
            w.close("],");
            w.open("else_body: vec![");
            for inner in else_body {
                write_statement(w, inner);
            }
            w.close("],");
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
        ClosureStatement::Expression { value, .. } => {
            w.open("ClosureStatement::Expression {");
            w.line(&format!("value: {},", expression(value)));
            w.line("location: SourceLocation::generated(),");
            w.close("},");
        }
    }
}

/// Render a closure expression inline. Expression trees in rule files stay
/// shallow, so nesting on one line keeps the generated artifacts readable.
pub(crate) fn expression(e: &ClosureExpression) -> String {
    match e {
        ClosureExpression::Null => "ClosureExpression::Null".to_string(),
        ClosureExpression::Boolean(b) => format!("ClosureExpression::Boolean({b})"),
        ClosureExpression::Integer(i) => format!("ClosureExpression::Integer({i})"),
        ClosureExpression::Double(d) => format!("ClosureExpression::Double({})", f64_lit(*d)),
        ClosureExpression::Str(s) => format!("ClosureExpression::Str({})", boxed_str(s)),
        ClosureExpression::Identifier(name) => {
            format!("ClosureExpression::Identifier({})", boxed_str(name))
        }
        ClosureExpression::Property {
            receiver,
            name,
            null_safe,
        } => format!(
            "ClosureExpression::Property {{ receiver: Box::new({}), name: {}, null_safe: {null_safe} }}",
            expression(receiver),
            boxed_str(name)
        ),
        ClosureExpression::Index { receiver, key } => format!(
            "ClosureExpression::Index {{ receiver: Box::new({}), key: Box::new({}) }}",
            expression(receiver),
            expression(key)
        ),
        ClosureExpression::Unary { op, operand } => format!(
            "ClosureExpression::Unary {{ op: {}, operand: Box::new({}) }}",
            unary_variant(*op),
            expression(operand)
        ),
        ClosureExpression::Binary { op, left, right } => format!(
            "ClosureExpression::Binary {{ op: {}, left: Box::new({}), right: Box::new({}) }}",
            binary_variant(*op),
            expression(left),
            expression(right)
        ),
        ClosureExpression::Ternary {
            condition,
            if_true,
            if_false,
        } => format!(
            "ClosureExpression::Ternary {{ condition: Box::new({}), if_true: Box::new({}), if_false: Box::new({}) }}",
            expression(condition),
            expression(if_true),
            expression(if_false)
        ),
        ClosureExpression::MethodCall {
            receiver,
            method,
            args,
            null_safe,
        } => {
            let rendered: Vec<String> = args.iter().map(expression).collect();
            format!(
                "ClosureExpression::MethodCall {{ receiver: Box::new({}), method: {}, args: vec![{}], null_safe: {null_safe} }}",
                expression(receiver),
                boxed_str(method),
                rendered.join(", ")
            )
        }
        ClosureExpression::StaticCall {
            type_name,
            method,
            args,
        } => {
            let rendered: Vec<String> = args.iter().map(expression).collect();
            format!(
                "ClosureExpression::StaticCall {{ type_name: {}, method: {}, args: vec![{}] }}",
                boxed_str(type_name),
                boxed_str(method),
                rendered.join(", ")
            )
        }
    }
}
