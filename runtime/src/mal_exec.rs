// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use analysis_engine_model::{
    ArithmeticMode, ClosureContract, FilterProgram, MalProgram, OpArg, OpNode, RuntimeOp,
};

use crate::closure_exec::CompiledClosure;
use crate::counter_window::{CounterWindow, global_counter_window};
use crate::family::arithmetic::apply_op;
use crate::sample::SampleFamily;
use crate::{Error, Labels, RuntimeServices};

/// The sample families visible to one expression run, keyed by metric name.
pub type SampleMap = HashMap<String, SampleFamily>;

/// Per-run knobs. The window discriminator suffixes the counter-window
/// metric name so tests sharing the process-wide window do not cross-talk.
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    pub window_discriminator: Option<String>,
}

enum MalValue {
    Scalar(f64),
    Family(SampleFamily),
}

/// One compiled MAL expression: an immutable op tree plus its lifted
/// closures, safe to run concurrently on disjoint sample maps.
#[derive(Debug)]
pub struct CompiledExpression {
    program: Arc<MalProgram>,
    closures: Vec<CompiledClosure>,
}

impl CompiledExpression {
    pub fn new(program: Arc<MalProgram>) -> Result<CompiledExpression, Error> {
        let mut closures = Vec::with_capacity(program.closures.len());
        for lifted in &program.closures {
            debug_assert_eq!(lifted.index, closures.len());
            closures.push(CompiledClosure::new(lifted.contract, lifted.closure.clone())?);
        }

        Ok(Self { program, closures })
    }

    pub fn get_metric_name(&self) -> &str {
        &self.program.metric_name
    }

    pub fn get_program(&self) -> &MalProgram {
        &self.program
    }

    /// Run against a sample map. Evaluation failures degrade to `EMPTY` and
    /// are logged at debug level; they never propagate.
    pub fn run(&self, samples: &SampleMap, services: &RuntimeServices) -> SampleFamily {
        self.run_with_options(
            samples,
            services,
            &EvalOptions::default(),
            global_counter_window(),
        )
    }

    pub fn run_with_options(
        &self,
        samples: &SampleMap,
        services: &RuntimeServices,
        options: &EvalOptions,
        counter_window: &CounterWindow,
    ) -> SampleFamily {
        match self.eval(&self.program.root, samples, services, options, counter_window) {
            Ok(MalValue::Family(family)) => family,
            Ok(MalValue::Scalar(_)) => {
                debug!(
                    metric = %self.program.metric_name,
                    "expression produced a scalar instead of a family"
                );
                SampleFamily::empty()
            }
            Err(error) => {
                debug!(
                    metric = %self.program.metric_name,
                    %error,
                    "expression evaluation failed"
                );
                SampleFamily::empty()
            }
        }
    }

    fn eval(
        &self,
        node: &OpNode,
        samples: &SampleMap,
        services: &RuntimeServices,
        options: &EvalOptions,
        counter_window: &CounterWindow,
    ) -> Result<MalValue, Error> {
        match node {
            OpNode::SampleRef { name } => Ok(MalValue::Family(
                samples
                    .get(name.as_ref())
                    .cloned()
                    .unwrap_or_else(SampleFamily::empty),
            )),
            OpNode::Scalar { value } => Ok(MalValue::Scalar(*value)),
            OpNode::Arithmetic {
                op,
                mode,
                left,
                right,
            } => {
                let left = self.eval(left, samples, services, options, counter_window)?;
                let right = self.eval(right, samples, services, options, counter_window)?;

                match (mode, left, right) {
                    (ArithmeticMode::ScalarScalar, MalValue::Scalar(a), MalValue::Scalar(b)) => {
                        Ok(MalValue::Scalar(apply_op(*op, a, b)))
                    }
                    (ArithmeticMode::FamilyScalar, MalValue::Family(f), MalValue::Scalar(s)) => {
                        Ok(MalValue::Family(f.scalar_op(*op, s, false)))
                    }
                    (ArithmeticMode::ScalarFamily, MalValue::Scalar(s), MalValue::Family(f)) => {
                        Ok(MalValue::Family(f.scalar_op(*op, s, true)))
                    }
                    (ArithmeticMode::FamilyFamily, MalValue::Family(a), MalValue::Family(b)) => {
                        Ok(MalValue::Family(a.family_op(*op, &b)))
                    }
                    _ => Err(Error::TypeMismatch(
                        "arithmetic operands do not match their transpiled mode".into(),
                    )),
                }
            }
            OpNode::Call { receiver, op, args } => {
                let receiver =
                    match self.eval(receiver, samples, services, options, counter_window)? {
                        MalValue::Family(family) => family,
                        MalValue::Scalar(_) => {
                            return Err(Error::TypeMismatch(format!(
                                "'{}' cannot be called on a scalar",
                                op.get_method_name()
                            )));
                        }
                    };

                self.eval_call(receiver, *op, args, services, options, counter_window)
                    .map(MalValue::Family)
            }
        }
    }

    fn eval_call(
        &self,
        receiver: SampleFamily,
        op: RuntimeOp,
        args: &[OpArg],
        services: &RuntimeServices,
        options: &EvalOptions,
        counter_window: &CounterWindow,
    ) -> Result<SampleFamily, Error> {
        let discriminator = options.window_discriminator.as_deref();

        match op {
            RuntimeOp::Sum => Ok(receiver.sum(&string_list(args, 0, op)?)),
            RuntimeOp::Max => Ok(receiver.max(&string_list(args, 0, op)?)),
            RuntimeOp::Min => Ok(receiver.min(&string_list(args, 0, op)?)),
            RuntimeOp::Avg => Ok(receiver.avg(&string_list(args, 0, op)?)),
            RuntimeOp::Latest => Ok(receiver.latest()),
            RuntimeOp::Rate => receiver.rate(string_arg(args, 0, op)?, counter_window, discriminator),
            RuntimeOp::Increase => {
                receiver.increase(string_arg(args, 0, op)?, counter_window, discriminator)
            }
            RuntimeOp::Irate => {
                receiver.irate(string_arg(args, 0, op)?, counter_window, discriminator)
            }
            RuntimeOp::Histogram => Ok(receiver.histogram()),
            RuntimeOp::HistogramPercentile => {
                receiver.histogram_percentile(int_list(args, 0, op)?)
            }
            RuntimeOp::Tag => receiver.tag(self.closure_arg(args, 0, op)?, services),
            RuntimeOp::Filter => receiver.filter(self.closure_arg(args, 0, op)?, services),
            RuntimeOp::TagEqual => {
                Ok(receiver.tag_equal(string_arg(args, 0, op)?, string_arg(args, 1, op)?))
            }
            RuntimeOp::TagNotEqual => {
                Ok(receiver.tag_not_equal(string_arg(args, 0, op)?, string_arg(args, 1, op)?))
            }
            RuntimeOp::TagMatch => {
                receiver.tag_match(string_arg(args, 0, op)?, string_arg(args, 1, op)?)
            }
            RuntimeOp::ForEach => receiver.for_each(
                string_arg(args, 0, op)?,
                self.closure_arg(args, 1, op)?,
                services,
            ),
            RuntimeOp::RetagByK8sMeta => {
                let OpArg::K8sRetagType(retag_type) = args
                    .get(1)
                    .ok_or_else(|| bad_arg(op, 1))?
                else {
                    return Err(bad_arg(op, 1));
                };

                Ok(receiver.retag_by_k8s_meta(
                    string_arg(args, 0, op)?,
                    *retag_type,
                    string_arg(args, 2, op)?,
                    string_arg(args, 3, op)?,
                    services,
                ))
            }
            RuntimeOp::Decorate => receiver.decorate(self.closure_arg(args, 0, op)?, services),
            RuntimeOp::Downsampling => {
                let OpArg::Downsampling(downsampling) =
                    args.get(0).ok_or_else(|| bad_arg(op, 0))?
                else {
                    return Err(bad_arg(op, 0));
                };
                Ok(receiver.downsampling(*downsampling))
            }
            RuntimeOp::Service => Ok(receiver.service(
                &string_list(args, 0, op)?,
                layer_arg(args, 1, op)?,
            )),
            RuntimeOp::Instance => Ok(receiver.instance(
                &string_list(args, 0, op)?,
                &string_list(args, 1, op)?,
                layer_arg(args, 2, op)?,
            )),
            RuntimeOp::Endpoint => Ok(receiver.endpoint(
                &string_list(args, 0, op)?,
                &string_list(args, 1, op)?,
                layer_arg(args, 2, op)?,
            )),
            RuntimeOp::ServiceRelation => Ok(receiver.service_relation(
                &string_list(args, 0, op)?,
                &string_list(args, 1, op)?,
                layer_arg(args, 2, op)?,
            )),
            RuntimeOp::InstanceRelation => Ok(receiver.instance_relation(
                &string_list(args, 0, op)?,
                &string_list(args, 1, op)?,
                layer_arg(args, 2, op)?,
            )),
            RuntimeOp::EndpointRelation => Ok(receiver.endpoint_relation(
                &string_list(args, 0, op)?,
                &string_list(args, 1, op)?,
                layer_arg(args, 2, op)?,
            )),
            RuntimeOp::Process => Ok(receiver.process(
                &string_list(args, 0, op)?,
                &string_list(args, 1, op)?,
                &string_list(args, 2, op)?,
                layer_arg(args, 3, op)?,
            )),
        }
    }

    fn closure_arg(
        &self,
        args: &[OpArg],
        index: usize,
        op: RuntimeOp,
    ) -> Result<&CompiledClosure, Error> {
        let OpArg::ClosureRef(closure_index) = args.get(index).ok_or_else(|| bad_arg(op, index))?
        else {
            return Err(bad_arg(op, index));
        };

        self.closures
            .get(*closure_index)
            .ok_or_else(|| bad_arg(op, index))
    }
}

fn bad_arg(op: RuntimeOp, index: usize) -> Error {
    Error::TypeMismatch(format!(
        "'{}' argument {index} does not match its transpiled kind",
        op.get_method_name()
    ))
}

fn string_arg(args: &[OpArg], index: usize, op: RuntimeOp) -> Result<&str, Error> {
    match args.get(index) {
        Some(OpArg::Str(s)) => Ok(s.as_ref()),
        _ => Err(bad_arg(op, index)),
    }
}

fn string_list<'a>(args: &'a [OpArg], index: usize, op: RuntimeOp) -> Result<Vec<&'a str>, Error> {
    match args.get(index) {
        Some(OpArg::StringList(list)) => Ok(list.iter().map(|s| s.as_ref()).collect()),
        _ => Err(bad_arg(op, index)),
    }
}

fn int_list(args: &[OpArg], index: usize, op: RuntimeOp) -> Result<&[i64], Error> {
    match args.get(index) {
        Some(OpArg::IntList(list)) => Ok(list),
        _ => Err(bad_arg(op, index)),
    }
}

fn layer_arg(args: &[OpArg], index: usize, op: RuntimeOp) -> Result<analysis_engine_model::Layer, Error> {
    match args.get(index) {
        Some(OpArg::Layer(layer)) => Ok(*layer),
        _ => Err(bad_arg(op, index)),
    }
}

/// One compiled file-level filter, registered under its literal text. A
/// failing predicate drops the sample and logs at debug level.
#[derive(Debug)]
pub struct CompiledFilter {
    literal: String,
    closure: CompiledClosure,
}

impl CompiledFilter {
    pub fn new(program: &FilterProgram) -> Result<CompiledFilter, Error> {
        Ok(Self {
            literal: program.literal.clone(),
            closure: CompiledClosure::new(
                ClosureContract::FilterPredicate,
                program.closure.clone(),
            )?,
        })
    }

    pub fn get_literal(&self) -> &str {
        &self.literal
    }

    pub fn test(&self, labels: &Labels, services: &RuntimeServices) -> bool {
        match self.closure.run_predicate(services, labels) {
            Ok(keep) => keep,
            Err(error) => {
                debug!(literal = %self.literal, %error, "filter predicate failed");
                false
            }
        }
    }
}
