// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;

use analysis_engine_model::{
    ExtractorStep, FilterBlock, FilterStep, GString, GStringPart, LalProgram, MetricSpec,
    SampledTraceSpec,
};

use crate::closure_exec::Interpreter;
use crate::sample::Sample;
use crate::{Error, Labels, RuntimeServices, Value};

/// One structured log record flowing through the log pipeline. The script
/// may modify tags, body, and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub service: String,
    pub service_instance: String,
    pub endpoint: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub body: String,
    pub tags: Labels,
    pub layer: String,
}

impl LogRecord {
    pub fn new(service: &str, body: &str, timestamp: i64) -> LogRecord {
        Self {
            service: service.into(),
            service_instance: String::new(),
            endpoint: String::new(),
            timestamp,
            body: body.into(),
            tags: Labels::new(),
            layer: String::new(),
        }
    }

    pub fn with_service_instance(mut self, service_instance: &str) -> LogRecord {
        self.service_instance = service_instance.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> LogRecord {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_layer(mut self, layer: &str) -> LogRecord {
        self.layer = layer.into();
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> LogRecord {
        self.tags.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampledTraceRecord {
    pub latency: Option<i64>,
    pub uri: Option<String>,
    pub reason: Option<String>,
}

/// Per-record execution state. One binding exists per log record and never
/// escapes its handler.
#[derive(Debug, Clone)]
pub struct LogBinding {
    pub log: LogRecord,
    pub parsed: Option<Value>,
    pub should_abort: bool,
    /// Sampler decision; a false means the record is dropped downstream.
    pub kept: bool,
    pub metrics: Vec<Sample>,
    pub sampled_traces: Vec<SampledTraceRecord>,
}

impl LogBinding {
    fn new(log: LogRecord, parsed: Option<Value>) -> LogBinding {
        Self {
            log,
            parsed,
            should_abort: false,
            kept: true,
            metrics: Vec::new(),
            sampled_traces: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct RateLimiter {
    windows: Mutex<HashMap<String, (i64, u32)>>,
}

impl RateLimiter {
    fn new() -> RateLimiter {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Fixed one-minute windows per key, driven by the record timestamp.
    fn admit(&self, key: &str, rpm: u32, timestamp: i64) -> bool {
        let minute = timestamp.div_euclid(60_000);
        let mut windows = self.windows.lock();

        let entry = windows.entry(key.to_string()).or_insert((minute, 0));
        if entry.0 != minute {
            *entry = (minute, 0);
        }
        entry.1 += 1;
        entry.1 <= rpm
    }
}

/// One compiled LAL script, registered under the canonical DSL SHA-256.
/// Immutable after loading apart from the interior rate-limiter state.
#[derive(Debug)]
pub struct CompiledScript {
    program: Arc<LalProgram>,
    regexes: BTreeMap<Box<str>, Regex>,
    limiter: RateLimiter,
}

impl CompiledScript {
    pub fn new(program: Arc<LalProgram>) -> Result<CompiledScript, Error> {
        let mut regexes = BTreeMap::new();
        for filter in program.script.get_filters() {
            collect_regexes(filter.get_steps(), &mut regexes)?;
        }

        Ok(Self {
            program,
            regexes,
            limiter: RateLimiter::new(),
        })
    }

    pub fn get_dsl_hash(&self) -> &str {
        &self.program.dsl_hash
    }

    /// Execute the script against one record. Evaluation failures stop the
    /// offending filter block, log at debug level, and never propagate.
    pub fn run(
        &self,
        record: LogRecord,
        parsed: Option<Value>,
        services: &RuntimeServices,
    ) -> LogBinding {
        let mut binding = LogBinding::new(record, parsed);

        for filter in self.program.script.get_filters() {
            if let Err(error) = self.run_filter(filter, &mut binding, services) {
                debug!(hash = self.get_dsl_hash(), %error, "log filter failed");
            }
            if binding.should_abort {
                break;
            }
        }

        binding
    }

    fn run_filter(
        &self,
        filter: &FilterBlock,
        binding: &mut LogBinding,
        services: &RuntimeServices,
    ) -> Result<(), Error> {
        self.run_steps(filter.get_steps(), binding, services)
    }

    fn run_steps(
        &self,
        steps: &[FilterStep],
        binding: &mut LogBinding,
        services: &RuntimeServices,
    ) -> Result<(), Error> {
        for step in steps {
            if binding.should_abort {
                break;
            }

            match step {
                FilterStep::Json { .. } => {
                    binding.parsed = serde_json::from_str::<serde_json::Value>(&binding.log.body)
                        .ok()
                        .map(Value::from);
                }
                FilterStep::Text { regexp, .. } => {
                    let regex = self
                        .regexes
                        .get(regexp)
                        .expect("patterns are compiled at load time");
                    binding.parsed = regex.captures(&binding.log.body).map(|captures| {
                        let mut map = BTreeMap::new();
                        for name in regex.capture_names().flatten() {
                            if let Some(m) = captures.name(name) {
                                map.insert(name.to_string(), Value::Str(m.as_str().to_string()));
                            }
                        }
                        Value::Map(map)
                    });
                }
                FilterStep::Extractor { steps, .. } => {
                    self.run_extractor(steps, binding, services)?;
                }
                FilterStep::Sink { sampler, .. } => {
                    if let Some(sampler) = sampler {
                        let key =
                            eval_gstring(&sampler.rate_limit_key, binding, services)?;
                        if !self.limiter.admit(&key, sampler.rpm, binding.log.timestamp) {
                            binding.kept = false;
                        }
                    }
                }
                FilterStep::Abort { .. } => {
                    binding.should_abort = true;
                }
                FilterStep::If {
                    branches,
                    else_steps,
                    ..
                } => {
                    let mut taken = false;
                    for branch in branches {
                        if eval_expression(branch.get_condition(), binding, services)?
                            .is_truthy()
                        {
                            self.run_steps(branch.get_steps(), binding, services)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.run_steps(else_steps, binding, services)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn run_extractor(
        &self,
        steps: &[ExtractorStep],
        binding: &mut LogBinding,
        services: &RuntimeServices,
    ) -> Result<(), Error> {
        for step in steps {
            if binding.should_abort {
                break;
            }

            match step {
                ExtractorStep::Tag { key, value, .. } => {
                    let value = eval_expression(value, binding, services)?;
                    if value != Value::Null {
                        binding.log.tags.insert(key.to_string(), value.to_string());
                    }
                }
                ExtractorStep::Metric { spec, .. } => {
                    self.extract_metric(spec, binding, services)?;
                }
                ExtractorStep::SampledTrace { spec, .. } => {
                    self.extract_sampled_trace(spec, binding, services)?;
                }
                ExtractorStep::If {
                    branches,
                    else_steps,
                    ..
                } => {
                    let mut taken = false;
                    for branch in branches {
                        if eval_expression(branch.get_condition(), binding, services)?
                            .is_truthy()
                        {
                            self.run_extractor(branch.get_steps(), binding, services)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.run_extractor(else_steps, binding, services)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn extract_metric(
        &self,
        spec: &MetricSpec,
        binding: &mut LogBinding,
        services: &RuntimeServices,
    ) -> Result<(), Error> {
        let name = eval_expression(&spec.name, binding, services)?.to_string();

        let timestamp = match &spec.timestamp {
            Some(expression) => eval_expression(expression, binding, services)?
                .as_number()
                .map(|n| n as i64)
                .ok_or_else(|| Error::TypeMismatch("metric timestamp is not numeric".into()))?,
            None => binding.log.timestamp,
        };

        let mut labels = Labels::new();
        for (key, expression) in &spec.labels {
            let value = eval_expression(expression, binding, services)?;
            if value != Value::Null {
                labels.insert(key.to_string(), value.to_string());
            }
        }

        let value = eval_expression(&spec.value, binding, services)?
            .as_number()
            .ok_or_else(|| Error::TypeMismatch("metric value is not numeric".into()))?;

        binding
            .metrics
            .push(Sample::new(&name, labels, value, timestamp));
        Ok(())
    }

    fn extract_sampled_trace(
        &self,
        spec: &SampledTraceSpec,
        binding: &mut LogBinding,
        services: &RuntimeServices,
    ) -> Result<(), Error> {
        let mut record = SampledTraceRecord::default();

        if let Some(expression) = &spec.latency {
            record.latency = eval_expression(expression, binding, services)?
                .as_number()
                .map(|n| n as i64);
        }
        if let Some(expression) = &spec.uri {
            let value = eval_expression(expression, binding, services)?;
            if value != Value::Null {
                record.uri = Some(value.to_string());
            }
        }
        if let Some(expression) = &spec.reason {
            let value = eval_expression(expression, binding, services)?;
            if value != Value::Null {
                record.reason = Some(value.to_string());
            }
        }

        binding.sampled_traces.push(record);
        Ok(())
    }
}

fn collect_regexes(
    steps: &[FilterStep],
    regexes: &mut BTreeMap<Box<str>, Regex>,
) -> Result<(), Error> {
    for step in steps {
        match step {
            FilterStep::Text { regexp, .. } => {
                if !regexes.contains_key(regexp) {
                    let regex = Regex::new(regexp).map_err(Error::RegexError)?;
                    regexes.insert(regexp.clone(), regex);
                }
            }
            FilterStep::If {
                branches,
                else_steps,
                ..
            } => {
                for branch in branches {
                    collect_regexes(branch.get_steps(), regexes)?;
                }
                collect_regexes(else_steps, regexes)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn log_value(record: &LogRecord) -> Value {
    let mut map = BTreeMap::new();
    map.insert("service".to_string(), Value::Str(record.service.clone()));
    map.insert(
        "serviceInstance".to_string(),
        Value::Str(record.service_instance.clone()),
    );
    map.insert("endpoint".to_string(), Value::Str(record.endpoint.clone()));
    map.insert("timestamp".to_string(), Value::Integer(record.timestamp));
    map.insert("body".to_string(), Value::Str(record.body.clone()));
    map.insert("layer".to_string(), Value::Str(record.layer.clone()));
    map.insert("tags".to_string(), Value::from_labels(&record.tags));
    Value::Map(map)
}

fn eval_expression(
    expression: &analysis_engine_model::ClosureExpression,
    binding: &LogBinding,
    services: &RuntimeServices,
) -> Result<Value, Error> {
    let mut interpreter = Interpreter::new(services);
    interpreter.bind("log", log_value(&binding.log));
    interpreter.bind(
        "parsed",
        binding.parsed.clone().unwrap_or(Value::Null),
    );
    interpreter.eval(expression)
}

fn eval_gstring(
    gstring: &GString,
    binding: &LogBinding,
    services: &RuntimeServices,
) -> Result<String, Error> {
    let mut out = String::new();
    for part in gstring.get_parts() {
        match part {
            GStringPart::Literal(text) => out.push_str(text),
            GStringPart::Expression(expression) => {
                out.push_str(&eval_expression(expression, binding, services)?.to_string());
            }
        }
    }
    Ok(out)
}
