// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use crate::{
    ArithmeticOp, Closure, DownsamplingType, K8sRetagType, Layer, OalFilterOp, OalLiteral,
};

/// Scope binding carried by a sample family after the terminal scope call.
/// The key lists name the labels projected to form the entity identity.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeBinding {
    Service {
        keys: Vec<Box<str>>,
        layer: Layer,
    },
    Instance {
        service_keys: Vec<Box<str>>,
        instance_keys: Vec<Box<str>>,
        layer: Layer,
    },
    Endpoint {
        service_keys: Vec<Box<str>>,
        endpoint_keys: Vec<Box<str>>,
        layer: Layer,
    },
    ServiceRelation {
        source_keys: Vec<Box<str>>,
        dest_keys: Vec<Box<str>>,
        layer: Layer,
    },
    InstanceRelation {
        source_keys: Vec<Box<str>>,
        dest_keys: Vec<Box<str>>,
        layer: Layer,
    },
    EndpointRelation {
        source_keys: Vec<Box<str>>,
        dest_keys: Vec<Box<str>>,
        layer: Layer,
    },
    Process {
        service_keys: Vec<Box<str>>,
        instance_keys: Vec<Box<str>>,
        process_keys: Vec<Box<str>>,
        layer: Layer,
    },
}

impl ScopeBinding {
    pub fn get_scope_name(&self) -> &'static str {
        match self {
            ScopeBinding::Service { .. } => "Service",
            ScopeBinding::Instance { .. } => "ServiceInstance",
            ScopeBinding::Endpoint { .. } => "Endpoint",
            ScopeBinding::ServiceRelation { .. } => "ServiceRelation",
            ScopeBinding::InstanceRelation { .. } => "ServiceInstanceRelation",
            ScopeBinding::EndpointRelation { .. } => "EndpointRelation",
            ScopeBinding::Process { .. } => "Process",
        }
    }

    pub fn get_layer(&self) -> Layer {
        match self {
            ScopeBinding::Service { layer, .. }
            | ScopeBinding::Instance { layer, .. }
            | ScopeBinding::Endpoint { layer, .. }
            | ScopeBinding::ServiceRelation { layer, .. }
            | ScopeBinding::InstanceRelation { layer, .. }
            | ScopeBinding::EndpointRelation { layer, .. }
            | ScopeBinding::Process { layer, .. } => *layer,
        }
    }

    pub fn set_layer(&mut self, new_layer: Layer) {
        match self {
            ScopeBinding::Service { layer, .. }
            | ScopeBinding::Instance { layer, .. }
            | ScopeBinding::Endpoint { layer, .. }
            | ScopeBinding::ServiceRelation { layer, .. }
            | ScopeBinding::InstanceRelation { layer, .. }
            | ScopeBinding::EndpointRelation { layer, .. }
            | ScopeBinding::Process { layer, .. } => *layer = new_layer,
        }
    }

    /// Every label key that participates in the entity identity, in
    /// projection order.
    pub fn get_identity_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();

        match self {
            ScopeBinding::Service { keys: k, .. } => keys.extend(k.iter().map(|v| v.as_ref())),
            ScopeBinding::Instance {
                service_keys,
                instance_keys,
                ..
            } => {
                keys.extend(service_keys.iter().map(|v| v.as_ref()));
                keys.extend(instance_keys.iter().map(|v| v.as_ref()));
            }
            ScopeBinding::Endpoint {
                service_keys,
                endpoint_keys,
                ..
            } => {
                keys.extend(service_keys.iter().map(|v| v.as_ref()));
                keys.extend(endpoint_keys.iter().map(|v| v.as_ref()));
            }
            ScopeBinding::ServiceRelation {
                source_keys,
                dest_keys,
                ..
            }
            | ScopeBinding::InstanceRelation {
                source_keys,
                dest_keys,
                ..
            }
            | ScopeBinding::EndpointRelation {
                source_keys,
                dest_keys,
                ..
            } => {
                keys.extend(source_keys.iter().map(|v| v.as_ref()));
                keys.extend(dest_keys.iter().map(|v| v.as_ref()));
            }
            ScopeBinding::Process {
                service_keys,
                instance_keys,
                process_keys,
                ..
            } => {
                keys.extend(service_keys.iter().map(|v| v.as_ref()));
                keys.extend(instance_keys.iter().map(|v| v.as_ref()));
                keys.extend(process_keys.iter().map(|v| v.as_ref()));
            }
        }

        keys
    }
}

/// The closed set of runtime operations a compiled MAL expression may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeOp {
    Sum,
    Max,
    Min,
    Avg,
    Latest,
    Rate,
    Increase,
    Irate,
    Histogram,
    HistogramPercentile,
    Tag,
    Filter,
    TagEqual,
    TagNotEqual,
    TagMatch,
    ForEach,
    RetagByK8sMeta,
    Decorate,
    Downsampling,
    Service,
    Instance,
    Endpoint,
    ServiceRelation,
    InstanceRelation,
    EndpointRelation,
    Process,
}

impl RuntimeOp {
    pub fn from_method_name(name: &str) -> Option<RuntimeOp> {
        Some(match name {
            "sum" => RuntimeOp::Sum,
            "max" => RuntimeOp::Max,
            "min" => RuntimeOp::Min,
            "avg" => RuntimeOp::Avg,
            "latest" => RuntimeOp::Latest,
            "rate" => RuntimeOp::Rate,
            "increase" => RuntimeOp::Increase,
            "irate" => RuntimeOp::Irate,
            "histogram" => RuntimeOp::Histogram,
            "histogram_percentile" => RuntimeOp::HistogramPercentile,
            "tag" => RuntimeOp::Tag,
            "filter" => RuntimeOp::Filter,
            "tagEqual" => RuntimeOp::TagEqual,
            "tagNotEqual" => RuntimeOp::TagNotEqual,
            "tagMatch" => RuntimeOp::TagMatch,
            "forEach" => RuntimeOp::ForEach,
            "retagByK8sMeta" => RuntimeOp::RetagByK8sMeta,
            "decorate" => RuntimeOp::Decorate,
            "downsampling" => RuntimeOp::Downsampling,
            "service" => RuntimeOp::Service,
            "instance" => RuntimeOp::Instance,
            "endpoint" => RuntimeOp::Endpoint,
            "serviceRelation" => RuntimeOp::ServiceRelation,
            "instanceRelation" => RuntimeOp::InstanceRelation,
            "endpointRelation" => RuntimeOp::EndpointRelation,
            "process" => RuntimeOp::Process,
            _ => return None,
        })
    }

    pub fn get_method_name(&self) -> &'static str {
        match self {
            RuntimeOp::Sum => "sum",
            RuntimeOp::Max => "max",
            RuntimeOp::Min => "min",
            RuntimeOp::Avg => "avg",
            RuntimeOp::Latest => "latest",
            RuntimeOp::Rate => "rate",
            RuntimeOp::Increase => "increase",
            RuntimeOp::Irate => "irate",
            RuntimeOp::Histogram => "histogram",
            RuntimeOp::HistogramPercentile => "histogram_percentile",
            RuntimeOp::Tag => "tag",
            RuntimeOp::Filter => "filter",
            RuntimeOp::TagEqual => "tagEqual",
            RuntimeOp::TagNotEqual => "tagNotEqual",
            RuntimeOp::TagMatch => "tagMatch",
            RuntimeOp::ForEach => "forEach",
            RuntimeOp::RetagByK8sMeta => "retagByK8sMeta",
            RuntimeOp::Decorate => "decorate",
            RuntimeOp::Downsampling => "downsampling",
            RuntimeOp::Service => "service",
            RuntimeOp::Instance => "instance",
            RuntimeOp::Endpoint => "endpoint",
            RuntimeOp::ServiceRelation => "serviceRelation",
            RuntimeOp::InstanceRelation => "instanceRelation",
            RuntimeOp::EndpointRelation => "endpointRelation",
            RuntimeOp::Process => "process",
        }
    }

    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            RuntimeOp::Service
                | RuntimeOp::Instance
                | RuntimeOp::Endpoint
                | RuntimeOp::ServiceRelation
                | RuntimeOp::InstanceRelation
                | RuntimeOp::EndpointRelation
                | RuntimeOp::Process
        )
    }
}

/// Whether each operand of an arithmetic node is a scalar or a family.
/// Decided at transpile time from expression context so the runtime performs
/// no dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticMode {
    ScalarScalar,
    FamilyScalar,
    ScalarFamily,
    FamilyFamily,
}

/// Argument to a lowered runtime call. Closure literals are replaced by an
/// index into the expression's lifted-closure table.
#[derive(Debug, Clone, PartialEq)]
pub enum OpArg {
    Double(f64),
    Str(Box<str>),
    StringList(Vec<Box<str>>),
    IntList(Vec<i64>),
    Layer(Layer),
    K8sRetagType(K8sRetagType),
    Downsampling(DownsamplingType),
    ClosureRef(usize),
}

/// Node of the lowered op tree.
#[derive(Debug, Clone, PartialEq)]
pub enum OpNode {
    SampleRef {
        name: Box<str>,
    },
    Scalar {
        value: f64,
    },
    Call {
        receiver: Box<OpNode>,
        op: RuntimeOp,
        args: Vec<OpArg>,
    },
    Arithmetic {
        op: ArithmeticOp,
        mode: ArithmeticMode,
        left: Box<OpNode>,
        right: Box<OpNode>,
    },
}

/// Contract a lifted closure is compiled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureContract {
    /// `tags -> tags` for `tag(…)`.
    TagRewrite,
    /// `tags -> bool` for `filter(…)` and file-level filters.
    FilterPredicate,
    /// `entity -> ()` for `decorate(…)`.
    Decorate,
    /// `(element, tags) -> ()` for `forEach(…)`.
    PerElement,
    /// `value -> map` for property extraction hooks.
    PropertiesExtractor,
}

/// A closure lifted out of a MAL expression into its own compiled callable.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureProgram {
    pub index: usize,
    pub contract: ClosureContract,
    pub closure: Closure,
}

/// Validation facts collected by tracing an expression once before emission.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMeta {
    /// `None` only for init expressions, which are exempt from the
    /// one-scope-call requirement.
    pub scope: Option<ScopeBinding>,
    pub aggregation_labels: Vec<Box<str>>,
    pub downsampling: Option<DownsamplingType>,
    pub histogram: bool,
    pub percentiles: Vec<i64>,
}

/// One compiled MAL expression: the unit registered under the composed
/// metric name.
#[derive(Debug, Clone, PartialEq)]
pub struct MalProgram {
    pub metric_name: String,
    /// Kept for diagnostics only; dispatch is by metric name.
    pub composed_expression: String,
    /// Lowercase hex SHA-256 of the composed expression text.
    pub expression_hash: String,
    /// True for a rule file's `initExp`, run once at pipeline setup.
    pub init: bool,
    pub root: OpNode,
    pub closures: Vec<ClosureProgram>,
    pub meta: ExpressionMeta,
}

/// A compiled file-level filter, registered under its literal text.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterProgram {
    pub literal: String,
    pub closure: Closure,
}

/// A compiled LAL script, registered under the canonical DSL SHA-256.
#[derive(Debug, Clone, PartialEq)]
pub struct LalProgram {
    pub dsl_hash: String,
    pub script: crate::LalScript,
}

/// The OAL aggregation functions with built-in runtime implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OalFunction {
    Count,
    Sum,
    Max,
    Min,
    LongAvg,
    DoubleAvg,
    Cpm,
    Histogram,
}

impl OalFunction {
    pub fn from_name(name: &str) -> Option<OalFunction> {
        Some(match name {
            "count" => OalFunction::Count,
            "sum" => OalFunction::Sum,
            "max" => OalFunction::Max,
            "min" => OalFunction::Min,
            "longAvg" => OalFunction::LongAvg,
            "doubleAvg" => OalFunction::DoubleAvg,
            "cpm" => OalFunction::Cpm,
            "histogram" => OalFunction::Histogram,
            _ => return None,
        })
    }

    pub fn get_name(&self) -> &'static str {
        match self {
            OalFunction::Count => "count",
            OalFunction::Sum => "sum",
            OalFunction::Max => "max",
            OalFunction::Min => "min",
            OalFunction::LongAvg => "longAvg",
            OalFunction::DoubleAvg => "doubleAvg",
            OalFunction::Cpm => "cpm",
            OalFunction::Histogram => "histogram",
        }
    }

    pub fn all() -> &'static [OalFunction] {
        &[
            OalFunction::Count,
            OalFunction::Sum,
            OalFunction::Max,
            OalFunction::Min,
            OalFunction::LongAvg,
            OalFunction::DoubleAvg,
            OalFunction::Cpm,
            OalFunction::Histogram,
        ]
    }
}

/// Filter attached to one OAL metric, evaluated against source fields at
/// dispatch time.
#[derive(Debug, Clone, PartialEq)]
pub struct OalFilterSpec {
    pub field: Box<str>,
    pub op: OalFilterOp,
    pub literal: OalLiteral,
}

/// One compiled OAL metric class.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricProgram {
    pub metric_name: String,
    pub fqn: String,
    pub source_name: String,
    pub scope_id: u32,
    pub function: OalFunction,
    pub args: Vec<OalLiteral>,
    /// `None` when the projection is `*`.
    pub value_field: Option<Box<str>>,
    /// Source fields projected to form the metric entity, in catalog order.
    pub entity_fields: Vec<Box<str>>,
    pub filters: Vec<OalFilterSpec>,
}

/// One compiled OAL dispatcher class: all metric forwardings for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherProgram {
    pub source_name: String,
    pub fqn: String,
    pub scope_id: u32,
    /// Metric names in statement definition order.
    pub metrics: Vec<String>,
}
