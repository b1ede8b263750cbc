// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use analysis_engine_oal_parser::OalParser;
use analysis_engine_model::{
    DispatcherProgram, MetricProgram, OalFilterSpec, OalFunction, OalStatement,
    oal_dispatcher_fqn, oal_metric_fqn, source_by_name,
};

use crate::TranspileError;

/// Result of emitting every OAL file of a build.
#[derive(Debug, Clone, PartialEq)]
pub struct OalEmission {
    /// One metric class per statement, in definition order.
    pub metrics: Vec<MetricProgram>,
    /// One dispatcher per source, its forwardings merged across statements.
    pub dispatchers: Vec<DispatcherProgram>,
    pub disabled_sources: Vec<Box<str>>,
}

/// Emits OAL metric and dispatcher classes. Files are fed in the order of
/// the static OAL-define table; statements emit in definition order within a
/// file. A metric name appearing twice anywhere in the corpus is fatal.
pub struct OalEmitter {
    metrics: Vec<MetricProgram>,
    dispatchers: BTreeMap<String, DispatcherProgram>,
    source_order: Vec<String>,
    disabled_sources: Vec<Box<str>>,
}

impl OalEmitter {
    pub fn new() -> OalEmitter {
        Self {
            metrics: Vec::new(),
            dispatchers: BTreeMap::new(),
            source_order: Vec::new(),
            disabled_sources: Vec::new(),
        }
    }

    pub fn emit_file(&mut self, file: &str, script: &str) -> Result<(), TranspileError> {
        let parsed = OalParser::parse_file(file, script)?;

        for statement in parsed.get_statements() {
            self.emit_statement(file, statement)?;
        }

        for disabled in parsed.get_disabled_sources() {
            if !self.disabled_sources.contains(disabled) {
                self.disabled_sources.push(disabled.clone());
            }
        }

        Ok(())
    }

    pub fn finish(self) -> OalEmission {
        let dispatchers = self
            .source_order
            .iter()
            .map(|source| self.dispatchers[source].clone())
            .collect();

        OalEmission {
            metrics: self.metrics,
            dispatchers,
            disabled_sources: self.disabled_sources,
        }
    }

    fn emit_statement(
        &mut self,
        file: &str,
        statement: &OalStatement,
    ) -> Result<(), TranspileError> {
        let metric_name = statement.get_metric_name();
        if self.metrics.iter().any(|m| m.metric_name == metric_name) {
            return Err(TranspileError::DuplicateMetricName {
                file: file.to_string(),
                metric: metric_name.to_string(),
            });
        }

        let source = source_by_name(statement.get_source_name()).map_err(|_| {
            TranspileError::UnknownSource {
                file: file.to_string(),
                source_name: statement.get_source_name().to_string(),
            }
        })?;

        let unknown_field = |field: &str| TranspileError::UnknownSourceField {
            file: file.to_string(),
            source_name: source.name.to_string(),
            field: field.to_string(),
        };

        if let Some(field) = statement.get_projection_field()
            && !source.fields.iter().any(|f| *f == field)
        {
            return Err(unknown_field(field));
        }

        let function = OalFunction::from_name(statement.get_function()).ok_or_else(|| {
            TranspileError::UnknownOalFunction {
                file: file.to_string(),
                name: statement.get_function().to_string(),
            }
        })?;

        let mut filters = Vec::with_capacity(statement.get_filters().len());
        for filter in statement.get_filters() {
            if !source.fields.iter().any(|f| *f == filter.field.as_ref()) {
                return Err(unknown_field(&filter.field));
            }
            filters.push(OalFilterSpec {
                field: filter.field.clone(),
                op: filter.op,
                literal: filter.literal.clone(),
            });
        }

        self.metrics.push(MetricProgram {
            metric_name: metric_name.to_string(),
            fqn: oal_metric_fqn(metric_name),
            source_name: source.name.to_string(),
            scope_id: source.id,
            function,
            args: statement.get_args().to_vec(),
            value_field: statement.get_projection_field().map(Box::from),
            entity_fields: source.identity.iter().map(|f| Box::from(*f)).collect(),
            filters,
        });

        if !self.dispatchers.contains_key(source.name) {
            self.source_order.push(source.name.to_string());
            self.dispatchers.insert(
                source.name.to_string(),
                DispatcherProgram {
                    source_name: source.name.to_string(),
                    fqn: oal_dispatcher_fqn(source.name),
                    scope_id: source.id,
                    metrics: Vec::new(),
                },
            );
        }
        self.dispatchers
            .get_mut(source.name)
            .expect("dispatcher was just inserted")
            .metrics
            .push(metric_name.to_string());

        Ok(())
    }
}

impl Default for OalEmitter {
    fn default() -> Self {
        Self::new()
    }
}
