// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tracing::{debug, warn};

use crate::lal_exec::{CompiledScript, LogRecord, SampledTraceRecord};
use crate::loader::{AnalysisRuntime, LoadError};
use crate::mal_exec::{CompiledExpression, CompiledFilter, EvalOptions, SampleMap};
use crate::sample::{Sample, SampleFamily};
use crate::{Value, counter_window::global_counter_window};

/// Receiver of scope-bound derived metric families.
pub trait MeterSink {
    fn accept(&mut self, metric_name: &str, family: &SampleFamily);
}

impl<F: FnMut(&str, &SampleFamily)> MeterSink for F {
    fn accept(&mut self, metric_name: &str, family: &SampleFamily) {
        self(metric_name, family)
    }
}

/// Runs compiled MAL expressions over incoming sample batches.
pub struct MeterPipeline<'a> {
    runtime: &'a AnalysisRuntime,
    options: EvalOptions,
}

impl<'a> MeterPipeline<'a> {
    /// Build the pipeline and execute every registered init expression once
    /// against an empty sample map. Init failures warn and do not abort.
    pub fn new(runtime: &'a AnalysisRuntime) -> MeterPipeline<'a> {
        for init in runtime.get_init_expressions() {
            let result = init.run(&SampleMap::new(), runtime.get_services());
            if result.is_empty() {
                debug!(metric = init.get_metric_name(), "init expression produced no samples");
            }
        }

        Self {
            runtime,
            options: EvalOptions::default(),
        }
    }

    pub fn with_window_discriminator(mut self, discriminator: &str) -> MeterPipeline<'a> {
        self.options.window_discriminator = Some(discriminator.into());
        self
    }

    /// Group a raw sample batch into families keyed by metric name,
    /// dropping samples the file-level filter rejects.
    pub fn build_sample_map(
        &self,
        samples: Vec<Sample>,
        filter: Option<&CompiledFilter>,
    ) -> SampleMap {
        let services = self.runtime.get_services();
        let mut grouped: std::collections::HashMap<String, Vec<Sample>> =
            std::collections::HashMap::new();

        for sample in samples {
            if let Some(filter) = filter
                && !filter.test(sample.get_labels(), services)
            {
                continue;
            }
            grouped
                .entry(sample.get_name().to_string())
                .or_default()
                .push(sample);
        }

        grouped
            .into_iter()
            .map(|(name, samples)| (name, SampleFamily::build(samples)))
            .collect()
    }

    /// Run the expressions registered under the given metric names and
    /// forward every non-empty scope-bound result to the sink.
    pub fn process(
        &self,
        metric_names: &[&str],
        samples: &SampleMap,
        sink: &mut dyn MeterSink,
    ) -> Result<(), LoadError> {
        for metric_name in metric_names {
            let expression = self.runtime.parse_metric(metric_name, "")?;
            self.run_expression(&expression, samples, sink);
        }

        Ok(())
    }

    fn run_expression(
        &self,
        expression: &Arc<CompiledExpression>,
        samples: &SampleMap,
        sink: &mut dyn MeterSink,
    ) {
        let family = expression.run_with_options(
            samples,
            self.runtime.get_services(),
            &self.options,
            global_counter_window(),
        );

        if family.is_empty() {
            return;
        }

        if family.get_scope().is_none() {
            warn!(
                metric = expression.get_metric_name(),
                "expression result has no scope binding; dropped"
            );
            return;
        }

        sink.accept(expression.get_metric_name(), &family);
    }
}

/// Outcome of running one log record through a compiled script.
#[derive(Debug, Clone)]
pub struct LogProcessResult {
    /// The record with any tag/body/timestamp modifications applied.
    pub record: LogRecord,
    /// False when the record was aborted or sampled out.
    pub kept: bool,
    /// Derived meter samples to feed the meter pipeline.
    pub metrics: Vec<Sample>,
    pub sampled_traces: Vec<SampledTraceRecord>,
}

/// Runs compiled LAL scripts over structured log records.
pub struct LogPipeline<'a> {
    runtime: &'a AnalysisRuntime,
}

impl<'a> LogPipeline<'a> {
    pub fn new(runtime: &'a AnalysisRuntime) -> LogPipeline<'a> {
        Self { runtime }
    }

    /// Resolve the compiled script for the configured DSL text.
    pub fn script_for(&self, dsl_text: &str) -> Result<Arc<CompiledScript>, LoadError> {
        self.runtime.load_log_script(dsl_text)
    }

    /// Run one record through a script.
    pub fn process(
        &self,
        script: &CompiledScript,
        record: LogRecord,
        parsed_payload: Option<Value>,
    ) -> LogProcessResult {
        let binding = script.run(record, parsed_payload, self.runtime.get_services());

        LogProcessResult {
            kept: binding.kept && !binding.should_abort,
            record: binding.log,
            metrics: binding.metrics,
            sampled_traces: binding.sampled_traces,
        }
    }
}
