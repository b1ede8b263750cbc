// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use analysis_engine_model::{
    DispatcherProgram, MetricProgram, OalFilterOp, OalFilterSpec, OalFunction, OalLiteral,
};

use crate::{Value, scope_registry::DisabledSources};

/// One source object handed to `dispatch`. Fields are the scope catalog's
/// field set for the source's scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    scope_name: String,
    timestamp: i64,
    fields: BTreeMap<String, Value>,
}

impl Source {
    pub fn new(scope_name: &str, timestamp: i64) -> Source {
        Self {
            scope_name: scope_name.into(),
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Source {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get_scope_name(&self) -> &str {
        &self.scope_name
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// One derived metric produced by a dispatcher, carrying its stream
/// aggregator so the sink knows how to fold it.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetric {
    pub metric_name: String,
    pub scope_id: u32,
    pub function: OalFunction,
    /// Entity identity, in catalog field order.
    pub entity: Vec<(String, String)>,
    pub value: f64,
    pub timestamp: i64,
}

/// Receiver of derived metrics. The storage-side aggregation behind it is an
/// external collaborator.
pub trait MetricsSink {
    fn accept(&mut self, metric: DerivedMetric);
}

impl<F: FnMut(DerivedMetric)> MetricsSink for F {
    fn accept(&mut self, metric: DerivedMetric) {
        self(metric)
    }
}

/// One instantiated OAL metric class.
#[derive(Debug)]
pub struct CompiledMetric {
    program: Arc<MetricProgram>,
}

impl CompiledMetric {
    pub fn new(program: Arc<MetricProgram>) -> CompiledMetric {
        Self { program }
    }

    pub fn get_metric_name(&self) -> &str {
        &self.program.metric_name
    }

    pub fn get_program(&self) -> &MetricProgram {
        &self.program
    }

    /// Evaluate the filter chain and projection against one source. `None`
    /// when a filter rejects the source or a field cannot be read.
    pub fn derive(&self, source: &Source) -> Option<DerivedMetric> {
        for filter in &self.program.filters {
            if !self.filter_matches(filter, source) {
                return None;
            }
        }

        let value = match &self.program.value_field {
            None => 1.0,
            Some(field) => match source.get_field(field).and_then(Value::as_number) {
                Some(value) => value,
                None => {
                    debug!(
                        metric = %self.program.metric_name,
                        field = field.as_ref(),
                        "source field missing or non-numeric; dispatch skipped"
                    );
                    return None;
                }
            },
        };

        let mut entity = Vec::with_capacity(self.program.entity_fields.len());
        for field in &self.program.entity_fields {
            let Some(field_value) = source.get_field(field) else {
                debug!(
                    metric = %self.program.metric_name,
                    field = field.as_ref(),
                    "source is missing an identity field; dispatch skipped"
                );
                return None;
            };
            entity.push((field.to_string(), field_value.to_string()));
        }

        Some(DerivedMetric {
            metric_name: self.program.metric_name.clone(),
            scope_id: self.program.scope_id,
            function: self.program.function,
            entity,
            value,
            timestamp: source.get_timestamp(),
        })
    }

    fn filter_matches(&self, filter: &OalFilterSpec, source: &Source) -> bool {
        let Some(field_value) = source.get_field(&filter.field) else {
            return false;
        };

        match filter.op {
            OalFilterOp::Equal => literal_equals(&filter.literal, field_value),
            OalFilterOp::NotEqual => !literal_equals(&filter.literal, field_value),
            OalFilterOp::GreaterThan => compare_numbers(field_value, &filter.literal, |o| o > 0),
            OalFilterOp::GreaterThanOrEqual => {
                compare_numbers(field_value, &filter.literal, |o| o >= 0)
            }
            OalFilterOp::LessThan => compare_numbers(field_value, &filter.literal, |o| o < 0),
            OalFilterOp::LessThanOrEqual => {
                compare_numbers(field_value, &filter.literal, |o| o <= 0)
            }
            OalFilterOp::Like => match &filter.literal {
                OalLiteral::Str(pattern) => like_matches(pattern, &field_value.to_string()),
                _ => false,
            },
            OalFilterOp::In => match &filter.literal {
                OalLiteral::List(entries) => {
                    entries.iter().any(|entry| literal_equals(entry, field_value))
                }
                _ => false,
            },
        }
    }
}

fn literal_equals(literal: &OalLiteral, value: &Value) -> bool {
    match literal {
        OalLiteral::Boolean(b) => matches!(value, Value::Boolean(v) if v == b),
        OalLiteral::Number(n) => value.as_number() == Some(*n),
        OalLiteral::Str(s) => value.to_string() == *s,
        OalLiteral::List(_) => false,
    }
}

fn compare_numbers(value: &Value, literal: &OalLiteral, accept: impl Fn(i8) -> bool) -> bool {
    let (Some(a), OalLiteral::Number(b)) = (value.as_number(), literal) else {
        return false;
    };

    let ordering = if a < *b {
        -1
    } else if a > *b {
        1
    } else {
        0
    };
    accept(ordering)
}

/// SQL-style `like`: `%` matches any run of characters at the start or end.
fn like_matches(pattern: &str, value: &str) -> bool {
    let starts = pattern.starts_with('%');
    let ends = pattern.len() > 1 && pattern.ends_with('%');
    let core = &pattern[usize::from(starts)..pattern.len() - usize::from(ends)];

    match (starts, ends) {
        (true, true) => value.contains(core),
        (true, false) => value.ends_with(core),
        (false, true) => value.starts_with(core),
        (false, false) => value == core,
    }
}

/// One instantiated OAL dispatcher: all metric forwardings for one source,
/// merged across statements.
#[derive(Debug)]
pub struct CompiledDispatcher {
    program: Arc<DispatcherProgram>,
    metrics: Vec<CompiledMetric>,
}

impl CompiledDispatcher {
    pub fn new(program: Arc<DispatcherProgram>, metrics: Vec<CompiledMetric>) -> CompiledDispatcher {
        Self { program, metrics }
    }

    pub fn get_source_name(&self) -> &str {
        &self.program.source_name
    }

    pub fn get_metrics(&self) -> &[CompiledMetric] {
        &self.metrics
    }

    /// Forward one source to every interested metric, unless the source is
    /// in the disable set.
    pub fn dispatch(&self, source: &Source, sink: &mut dyn MetricsSink) {
        if DisabledSources::is_disabled(&self.program.source_name) {
            return;
        }

        for metric in &self.metrics {
            if let Some(derived) = metric.derive(source) {
                sink.accept(derived);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn latency_metric(filters: Vec<OalFilterSpec>) -> CompiledMetric {
        CompiledMetric::new(Arc::new(MetricProgram {
            metric_name: "endpoint_avg".into(),
            fqn: "oal.rt.metrics.EndpointAvg".into(),
            source_name: "Endpoint".into(),
            scope_id: 3,
            function: OalFunction::LongAvg,
            args: vec![],
            value_field: Some("latency".into()),
            entity_fields: vec!["serviceName".into(), "name".into()],
            filters,
        }))
    }

    fn endpoint_source(latency: i64, status: bool) -> Source {
        Source::new("Endpoint", 1_000)
            .with_field("name", Value::Str("/api/orders".into()))
            .with_field("serviceName", Value::Str("order-service".into()))
            .with_field("latency", Value::Integer(latency))
            .with_field("status", Value::Boolean(status))
    }

    #[test]
    fn test_derive_projects_value_and_entity() {
        let metric = latency_metric(vec![]);

        let derived = metric.derive(&endpoint_source(42, true)).unwrap();

        assert_eq!("endpoint_avg", derived.metric_name);
        assert_eq!(OalFunction::LongAvg, derived.function);
        assert_eq!(42.0, derived.value);
        assert_eq!(
            vec![
                ("serviceName".to_string(), "order-service".to_string()),
                ("name".to_string(), "/api/orders".to_string()),
            ],
            derived.entity
        );
    }

    #[test]
    fn test_filters_reject_sources() {
        let metric = latency_metric(vec![OalFilterSpec {
            field: "status".into(),
            op: OalFilterOp::Equal,
            literal: OalLiteral::Boolean(true),
        }]);

        assert!(metric.derive(&endpoint_source(42, true)).is_some());
        assert!(metric.derive(&endpoint_source(42, false)).is_none());
    }

    #[test]
    fn test_like_and_in_filters() {
        assert!(like_matches("%error%", "some error text"));
        assert!(like_matches("/api/%", "/api/orders"));
        assert!(like_matches("%.html", "index.html"));
        assert!(!like_matches("/api/%", "/health"));

        let metric = latency_metric(vec![OalFilterSpec {
            field: "latency".into(),
            op: OalFilterOp::In,
            literal: OalLiteral::List(vec![
                OalLiteral::Number(42.0),
                OalLiteral::Number(43.0),
            ]),
        }]);

        assert!(metric.derive(&endpoint_source(42, true)).is_some());
        assert!(metric.derive(&endpoint_source(44, true)).is_none());
    }
}
