// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{Closure, DownsamplingType, K8sRetagType, Layer, SourceLocation};

/// Arithmetic operators shared by the MAL surface grammar, the closure
/// sub-grammar, and the lowered op tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn get_symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }
}

/// A parsed MAL expression. Parenthesized sub-expressions are transparent
/// and do not appear as nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum MalExpression {
    /// Bare identifier resolved against the sample-family map at run time.
    SampleRef {
        name: Box<str>,
        location: SourceLocation,
    },

    /// Scalar literal operand of an arithmetic node.
    Number {
        value: f64,
        location: SourceLocation,
    },

    MethodCall {
        receiver: Box<MalExpression>,
        method: Box<str>,
        args: Vec<MalParameter>,
        location: SourceLocation,
    },

    Arithmetic {
        op: ArithmeticOp,
        left: Box<MalExpression>,
        right: Box<MalExpression>,
        location: SourceLocation,
    },
}

impl MalExpression {
    pub fn get_location(&self) -> &SourceLocation {
        match self {
            MalExpression::SampleRef { location, .. } => location,
            MalExpression::Number { location, .. } => location,
            MalExpression::MethodCall { location, .. } => location,
            MalExpression::Arithmetic { location, .. } => location,
        }
    }

    /// Names of all samples referenced anywhere in the expression, in
    /// left-to-right order, without duplicates.
    pub fn get_sample_refs(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_sample_refs(&mut names);
        names
    }

    fn collect_sample_refs<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            MalExpression::SampleRef { name, .. } => {
                if !names.contains(&name.as_ref()) {
                    names.push(name);
                }
            }
            MalExpression::Number { .. } => {}
            MalExpression::MethodCall { receiver, .. } => receiver.collect_sample_refs(names),
            MalExpression::Arithmetic { left, right, .. } => {
                left.collect_sample_refs(names);
                right.collect_sample_refs(names);
            }
        }
    }
}

/// Parameter atoms accepted inside a MAL method call.
#[derive(Debug, Clone, PartialEq)]
pub enum MalParameter {
    Number(f64),

    Str(Box<str>),

    /// `['a', 'b']`
    StringList(Vec<Box<str>>),

    /// `[50, 75, 99]` in percentile position.
    NumberList(Vec<i64>),

    Layer(Layer),

    K8sRetagType(K8sRetagType),

    Downsampling(DownsamplingType),

    Closure(Closure),
}

/// One `(name, exp)` entry of a MAL rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRuleEntry {
    pub name: String,
    pub exp: String,
}

/// The MAL rule-file model shared by the standard, Zabbix, and Telegraf
/// dialects. Dialect differences are resolved by the rule loader before
/// this model is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRules {
    pub metric_prefix: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_suffix: Option<String>,

    /// File-level sample filter literal, compiled once per distinct literal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_exp: Option<String>,

    pub metrics_rules: Vec<MetricRuleEntry>,
}

impl MetricRules {
    /// The storage-facing metric name for one rule entry.
    pub fn compose_metric_name(&self, entry_name: &str) -> String {
        format!("{}_{}", self.metric_prefix, entry_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ref(name: &str) -> MalExpression {
        MalExpression::SampleRef {
            name: name.into(),
            location: SourceLocation::generated(),
        }
    }

    #[test]
    fn test_sample_refs_are_deduplicated_in_order() {
        let expression = MalExpression::Arithmetic {
            op: ArithmeticOp::Add,
            left: Box::new(MalExpression::Arithmetic {
                op: ArithmeticOp::Divide,
                left: Box::new(sample_ref("b")),
                right: Box::new(sample_ref("a")),
                location: SourceLocation::generated(),
            }),
            right: Box::new(sample_ref("b")),
            location: SourceLocation::generated(),
        };

        assert_eq!(vec!["b", "a"], expression.get_sample_refs());
    }

    #[test]
    fn test_compose_metric_name() {
        let rules = MetricRules {
            metric_prefix: "meter_vm".into(),
            exp_prefix: None,
            exp_suffix: None,
            filter: None,
            init_exp: None,
            metrics_rules: vec![],
        };

        assert_eq!("meter_vm_cpu_total", rules.compose_metric_name("cpu_total"));
    }
}
