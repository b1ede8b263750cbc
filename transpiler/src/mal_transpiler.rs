// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use analysis_engine_mal_parser::MalParser;
use analysis_engine_model::{
    ArithmeticMode, AssignmentTarget, Closure, ClosureContract, ClosureExpression,
    ClosureProgram, ClosureStatement, ConditionalBranch, DownsamplingType, ExpressionMeta,
    FilterProgram, Layer, MalExpression, MalParameter, MalProgram, OpArg, OpNode, RuntimeOp,
    ScopeBinding,
};

use crate::compose::sha256_hex;
use crate::TranspileError;

/// Lower one composed MAL expression into its compiled program. The
/// expression is traced once through a validation context while being
/// lowered; any violation aborts the build.
pub fn transpile_expression(
    file: &str,
    metric_name: &str,
    composed_expression: &str,
    init: bool,
) -> Result<MalProgram, TranspileError> {
    let ast = MalParser::parse_expression(file, composed_expression)?;

    let mut lowering = Lowering {
        file,
        closures: Vec::new(),
        context: ExpressionContext::default(),
    };

    let info = lowering.lower(&ast)?;

    if !info.has_scope && !init {
        return Err(TranspileError::MissingScope {
            file: file.to_string(),
            metric: metric_name.to_string(),
        });
    }

    let context = lowering.context;
    Ok(MalProgram {
        metric_name: metric_name.to_string(),
        composed_expression: composed_expression.to_string(),
        expression_hash: sha256_hex(composed_expression),
        init,
        root: info.node,
        closures: lowering.closures,
        meta: ExpressionMeta {
            scope: context.scope,
            aggregation_labels: context.aggregation_labels,
            downsampling: context.downsampling,
            histogram: context.histogram,
            percentiles: context.percentiles,
        },
    })
}

/// Compile one distinct file-level filter literal.
pub fn transpile_filter_literal(
    file: &str,
    literal: &str,
) -> Result<FilterProgram, TranspileError> {
    let closure = MalParser::parse_filter(file, literal)?;
    let closure = prepare_closure(file, closure, ClosureContract::FilterPredicate, "filter")?;

    Ok(FilterProgram {
        literal: literal.to_string(),
        closure,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ValueKind {
    Scalar,
    Family,
}

struct NodeInfo {
    node: OpNode,
    kind: ValueKind,
    has_scope: bool,
}

/// Facts recorded while tracing the expression: projected scope, aggregation
/// labels, downsampling type, histogram-ness, and percentile list.
#[derive(Debug, Default)]
struct ExpressionContext {
    scope: Option<ScopeBinding>,
    aggregation_labels: Vec<Box<str>>,
    downsampling: Option<DownsamplingType>,
    histogram: bool,
    percentiles: Vec<i64>,
}

struct Lowering<'a> {
    file: &'a str,
    closures: Vec<ClosureProgram>,
    context: ExpressionContext,
}

impl Lowering<'_> {
    fn lower(&mut self, expression: &MalExpression) -> Result<NodeInfo, TranspileError> {
        match expression {
            MalExpression::SampleRef { name, .. } => Ok(NodeInfo {
                node: OpNode::SampleRef { name: name.clone() },
                kind: ValueKind::Family,
                has_scope: false,
            }),
            MalExpression::Number { value, .. } => Ok(NodeInfo {
                node: OpNode::Scalar { value: *value },
                kind: ValueKind::Scalar,
                has_scope: false,
            }),
            MalExpression::Arithmetic {
                op, left, right, ..
            } => {
                let left = self.lower(left)?;
                let right = self.lower(right)?;

                if left.has_scope || right.has_scope {
                    return Err(TranspileError::OperationAfterScope {
                        file: self.file.to_string(),
                        metric: String::new(),
                        op: op.get_symbol().to_string(),
                    });
                }

                let mode = match (left.kind, right.kind) {
                    (ValueKind::Scalar, ValueKind::Scalar) => ArithmeticMode::ScalarScalar,
                    (ValueKind::Family, ValueKind::Scalar) => ArithmeticMode::FamilyScalar,
                    (ValueKind::Scalar, ValueKind::Family) => ArithmeticMode::ScalarFamily,
                    (ValueKind::Family, ValueKind::Family) => ArithmeticMode::FamilyFamily,
                };

                let kind = match mode {
                    ArithmeticMode::ScalarScalar => ValueKind::Scalar,
                    _ => ValueKind::Family,
                };

                Ok(NodeInfo {
                    node: OpNode::Arithmetic {
                        op: *op,
                        mode,
                        left: Box::new(left.node),
                        right: Box::new(right.node),
                    },
                    kind,
                    has_scope: false,
                })
            }
            MalExpression::MethodCall {
                receiver,
                method,
                args,
                ..
            } => self.lower_call(receiver, method, args),
        }
    }

    fn lower_call(
        &mut self,
        receiver: &MalExpression,
        method: &str,
        args: &[MalParameter],
    ) -> Result<NodeInfo, TranspileError> {
        let op = RuntimeOp::from_method_name(method).ok_or_else(|| {
            TranspileError::UnknownFunction {
                file: self.file.to_string(),
                name: method.to_string(),
            }
        })?;

        let receiver = self.lower(receiver)?;

        if receiver.kind == ValueKind::Scalar {
            return Err(TranspileError::BadArgument {
                file: self.file.to_string(),
                op: method.to_string(),
                index: 0,
                reason: "sample family operations cannot be called on a scalar".into(),
            });
        }

        if receiver.has_scope
            && !matches!(op, RuntimeOp::Decorate | RuntimeOp::Downsampling)
        {
            return Err(TranspileError::OperationAfterScope {
                file: self.file.to_string(),
                metric: String::new(),
                op: method.to_string(),
            });
        }

        let lowered_args = self.lower_args(op, args)?;
        self.record_context(op, &lowered_args)?;

        Ok(NodeInfo {
            node: OpNode::Call {
                receiver: Box::new(receiver.node),
                op,
                args: lowered_args,
            },
            kind: ValueKind::Family,
            has_scope: receiver.has_scope || op.is_scope(),
        })
    }

    fn lower_args(
        &mut self,
        op: RuntimeOp,
        args: &[MalParameter],
    ) -> Result<Vec<OpArg>, TranspileError> {
        use ArgKind::*;

        let expected: &[ArgKind] = match op {
            RuntimeOp::Sum | RuntimeOp::Max | RuntimeOp::Min | RuntimeOp::Avg => &[Strings],
            RuntimeOp::Latest | RuntimeOp::Histogram => &[],
            RuntimeOp::Rate | RuntimeOp::Increase | RuntimeOp::Irate => &[Window],
            RuntimeOp::HistogramPercentile => &[Percentiles],
            RuntimeOp::Tag => &[ClosureOf(ClosureContract::TagRewrite)],
            RuntimeOp::Filter => &[ClosureOf(ClosureContract::FilterPredicate)],
            RuntimeOp::TagEqual | RuntimeOp::TagNotEqual => &[Text, Text],
            RuntimeOp::TagMatch => &[Text, Pattern],
            RuntimeOp::ForEach => &[Text, ClosureOf(ClosureContract::PerElement)],
            RuntimeOp::RetagByK8sMeta => &[Text, Retag, Text, Text],
            RuntimeOp::Decorate => &[ClosureOf(ClosureContract::Decorate)],
            RuntimeOp::Downsampling => &[Sampling],
            RuntimeOp::Service => &[Strings, LayerRef],
            RuntimeOp::Instance
            | RuntimeOp::Endpoint
            | RuntimeOp::ServiceRelation
            | RuntimeOp::InstanceRelation
            | RuntimeOp::EndpointRelation => &[Strings, Strings, LayerRef],
            RuntimeOp::Process => &[Strings, Strings, Strings, LayerRef],
        };

        if args.len() != expected.len() {
            return Err(self.bad_argument(
                op,
                args.len(),
                format!("expected {} argument(s), found {}", expected.len(), args.len()),
            ));
        }

        let mut lowered = Vec::with_capacity(args.len());
        for (index, (arg, kind)) in args.iter().zip(expected).enumerate() {
            lowered.push(self.lower_arg(op, index, arg, *kind)?);
        }

        Ok(lowered)
    }

    fn lower_arg(
        &mut self,
        op: RuntimeOp,
        index: usize,
        arg: &MalParameter,
        kind: ArgKind,
    ) -> Result<OpArg, TranspileError> {
        match (kind, arg) {
            (ArgKind::Strings, MalParameter::StringList(list)) => {
                Ok(OpArg::StringList(list.clone()))
            }
            (ArgKind::Text, MalParameter::Str(text)) => Ok(OpArg::Str(text.clone())),
            (ArgKind::Window, MalParameter::Str(window)) => {
                if !window.starts_with('P') {
                    return Err(self.bad_argument(
                        op,
                        index,
                        format!("'{window}' is not an ISO-8601 window"),
                    ));
                }
                Ok(OpArg::Str(window.clone()))
            }
            (ArgKind::Pattern, MalParameter::Str(pattern)) => {
                regex::Regex::new(pattern).map_err(|source| TranspileError::InvalidRegex {
                    file: self.file.to_string(),
                    pattern: pattern.to_string(),
                    source,
                })?;
                Ok(OpArg::Str(pattern.clone()))
            }
            (ArgKind::Percentiles, MalParameter::NumberList(list)) => {
                for p in list {
                    if !(0..=100).contains(p) {
                        return Err(self.bad_argument(
                            op,
                            index,
                            format!("percentile {p} is outside [0, 100]"),
                        ));
                    }
                }
                Ok(OpArg::IntList(list.clone()))
            }
            (ArgKind::LayerRef, MalParameter::Layer(layer)) => Ok(OpArg::Layer(*layer)),
            (ArgKind::Retag, MalParameter::K8sRetagType(retag)) => {
                Ok(OpArg::K8sRetagType(*retag))
            }
            (ArgKind::Sampling, MalParameter::Downsampling(downsampling)) => {
                Ok(OpArg::Downsampling(*downsampling))
            }
            (ArgKind::ClosureOf(contract), MalParameter::Closure(closure)) => {
                let closure =
                    prepare_closure(self.file, closure.clone(), contract, op.get_method_name())?;
                let closure_index = self.closures.len();
                self.closures.push(ClosureProgram {
                    index: closure_index,
                    contract,
                    closure,
                });
                Ok(OpArg::ClosureRef(closure_index))
            }
            _ => Err(self.bad_argument(op, index, "argument kind mismatch".into())),
        }
    }

    fn record_context(&mut self, op: RuntimeOp, args: &[OpArg]) -> Result<(), TranspileError> {
        match op {
            RuntimeOp::Sum | RuntimeOp::Max | RuntimeOp::Min | RuntimeOp::Avg => {
                if let Some(OpArg::StringList(labels)) = args.first() {
                    for label in labels {
                        if !self.context.aggregation_labels.contains(label) {
                            self.context.aggregation_labels.push(label.clone());
                        }
                    }
                }
            }
            RuntimeOp::Latest => {
                self.context.downsampling = Some(DownsamplingType::Latest);
            }
            RuntimeOp::Downsampling => {
                if let Some(OpArg::Downsampling(downsampling)) = args.first() {
                    self.context.downsampling = Some(*downsampling);
                }
            }
            RuntimeOp::Histogram => {
                self.context.histogram = true;
            }
            RuntimeOp::HistogramPercentile => {
                if !self.context.histogram {
                    return Err(self.bad_argument(
                        op,
                        0,
                        "histogram_percentile requires histogram() first".into(),
                    ));
                }
                if let Some(OpArg::IntList(percentiles)) = args.first() {
                    self.context.percentiles = percentiles.clone();
                }
            }
            _ if op.is_scope() => {
                if self.context.scope.is_some() {
                    return Err(TranspileError::MultipleScopes {
                        file: self.file.to_string(),
                        metric: String::new(),
                    });
                }
                self.context.scope = Some(build_scope_binding(op, args));
            }
            _ => {}
        }

        Ok(())
    }

    fn bad_argument(&self, op: RuntimeOp, index: usize, reason: String) -> TranspileError {
        TranspileError::BadArgument {
            file: self.file.to_string(),
            op: op.get_method_name().to_string(),
            index,
            reason,
        }
    }
}

fn string_list_arg(args: &[OpArg], index: usize) -> Vec<Box<str>> {
    match args.get(index) {
        Some(OpArg::StringList(list)) => list.clone(),
        _ => Vec::new(),
    }
}

fn layer_of(args: &[OpArg], index: usize) -> Layer {
    match args.get(index) {
        Some(OpArg::Layer(layer)) => *layer,
        _ => Layer::Undefined,
    }
}

fn build_scope_binding(op: RuntimeOp, args: &[OpArg]) -> ScopeBinding {
    match op {
        RuntimeOp::Service => ScopeBinding::Service {
            keys: string_list_arg(args, 0),
            layer: layer_of(args, 1),
        },
        RuntimeOp::Instance => ScopeBinding::Instance {
            service_keys: string_list_arg(args, 0),
            instance_keys: string_list_arg(args, 1),
            layer: layer_of(args, 2),
        },
        RuntimeOp::Endpoint => ScopeBinding::Endpoint {
            service_keys: string_list_arg(args, 0),
            endpoint_keys: string_list_arg(args, 1),
            layer: layer_of(args, 2),
        },
        RuntimeOp::ServiceRelation => ScopeBinding::ServiceRelation {
            source_keys: string_list_arg(args, 0),
            dest_keys: string_list_arg(args, 1),
            layer: layer_of(args, 2),
        },
        RuntimeOp::InstanceRelation => ScopeBinding::InstanceRelation {
            source_keys: string_list_arg(args, 0),
            dest_keys: string_list_arg(args, 1),
            layer: layer_of(args, 2),
        },
        RuntimeOp::EndpointRelation => ScopeBinding::EndpointRelation {
            source_keys: string_list_arg(args, 0),
            dest_keys: string_list_arg(args, 1),
            layer: layer_of(args, 2),
        },
        RuntimeOp::Process => ScopeBinding::Process {
            service_keys: string_list_arg(args, 0),
            instance_keys: string_list_arg(args, 1),
            process_keys: string_list_arg(args, 2),
            layer: layer_of(args, 3),
        },
        _ => unreachable!("build_scope_binding is only called for scope ops"),
    }
}

#[derive(Debug, Clone, Copy)]
enum ArgKind {
    Strings,
    Text,
    Window,
    Pattern,
    Percentiles,
    LayerRef,
    Retag,
    Sampling,
    ClosureOf(ClosureContract),
}

/// Validate a closure against its contract and desugar `tags.key` property
/// access on the tag-map parameter into explicit index access, so the
/// compiled callable performs no dynamic property lookup.
fn prepare_closure(
    file: &str,
    closure: Closure,
    contract: ClosureContract,
    op_name: &str,
) -> Result<Closure, TranspileError> {
    let expected_params = match contract {
        ClosureContract::PerElement => 2,
        _ => 1,
    };

    if closure.get_params().len() != expected_params {
        return Err(TranspileError::BadArgument {
            file: file.to_string(),
            op: op_name.to_string(),
            index: 0,
            reason: format!(
                "closure takes {} parameter(s), found {}",
                expected_params,
                closure.get_params().len()
            ),
        });
    }

    let tag_param = match contract {
        ClosureContract::PerElement => closure.get_params()[1].clone(),
        ClosureContract::TagRewrite | ClosureContract::FilterPredicate => {
            closure.get_params()[0].clone()
        }
        // Decorate and properties-extractor closures address their own
        // parameter; no tag-map sugar applies.
        _ => {
            return Ok(closure);
        }
    };

    let params = closure.get_params().to_vec();
    let location = closure.get_location().clone();
    let body = closure
        .get_body()
        .iter()
        .map(|statement| desugar_statement(statement, &tag_param))
        .collect();

    Ok(Closure::new(params, body, location))
}

fn desugar_statement(statement: &ClosureStatement, tag_param: &str) -> ClosureStatement {
    match statement {
        ClosureStatement::Declare {
            name,
            value,
            location,
        } => ClosureStatement::Declare {
            name: name.clone(),
            value: desugar_expression(value, tag_param),
            location: location.clone(),
        },
        ClosureStatement::Assign {
            target,
            value,
            location,
        } => ClosureStatement::Assign {
            target: desugar_target(target, tag_param),
            value: desugar_expression(value, tag_param),
            location: location.clone(),
        },
        ClosureStatement::Return { value, location } => ClosureStatement::Return {
            value: value.as_ref().map(|v| desugar_expression(v, tag_param)),
            location: location.clone(),
        },
        ClosureStatement::If {
            branches,
            else_body,
            location,
        } => ClosureStatement::If {
            branches: branches
                .iter()
                .map(|branch| {
                    ConditionalBranch::new(
                        desugar_expression(branch.get_condition(), tag_param),
                        branch
                            .get_body()
                            .iter()
                            .map(|s| desugar_statement(s, tag_param))
                            .collect(),
                    )
                })
                .collect(),
            else_body: else_body
                .iter()
                .map(|s| desugar_statement(s, tag_param))
                .collect(),
            location: location.clone(),
        },
        ClosureStatement::Expression { value, location } => ClosureStatement::Expression {
            value: desugar_expression(value, tag_param),
            location: location.clone(),
        },
    }
}

fn desugar_target(target: &AssignmentTarget, tag_param: &str) -> AssignmentTarget {
    match target {
        AssignmentTarget::Variable { name } => AssignmentTarget::Variable { name: name.clone() },
        AssignmentTarget::Index { receiver, key } => AssignmentTarget::Index {
            receiver: desugar_expression(receiver, tag_param),
            key: desugar_expression(key, tag_param),
        },
        AssignmentTarget::Property { receiver, name } => {
            let receiver = desugar_expression(receiver, tag_param);
            if is_tag_param(&receiver, tag_param) {
                AssignmentTarget::Index {
                    receiver,
                    key: ClosureExpression::Str(name.clone()),
                }
            } else {
                AssignmentTarget::Property {
                    receiver,
                    name: name.clone(),
                }
            }
        }
    }
}

fn is_tag_param(expression: &ClosureExpression, tag_param: &str) -> bool {
    matches!(expression, ClosureExpression::Identifier(name) if name.as_ref() == tag_param)
}

fn desugar_expression(expression: &ClosureExpression, tag_param: &str) -> ClosureExpression {
    match expression {
        ClosureExpression::Property {
            receiver,
            name,
            null_safe,
        } => {
            let receiver = desugar_expression(receiver, tag_param);
            if is_tag_param(&receiver, tag_param) && !null_safe {
                ClosureExpression::Index {
                    receiver: Box::new(receiver),
                    key: Box::new(ClosureExpression::Str(name.clone())),
                }
            } else {
                ClosureExpression::Property {
                    receiver: Box::new(receiver),
                    name: name.clone(),
                    null_safe: *null_safe,
                }
            }
        }
        ClosureExpression::Index { receiver, key } => ClosureExpression::Index {
            receiver: Box::new(desugar_expression(receiver, tag_param)),
            key: Box::new(desugar_expression(key, tag_param)),
        },
        ClosureExpression::Unary { op, operand } => ClosureExpression::Unary {
            op: *op,
            operand: Box::new(desugar_expression(operand, tag_param)),
        },
        ClosureExpression::Binary { op, left, right } => ClosureExpression::Binary {
            op: *op,
            left: Box::new(desugar_expression(left, tag_param)),
            right: Box::new(desugar_expression(right, tag_param)),
        },
        ClosureExpression::Ternary {
            condition,
            if_true,
            if_false,
        } => ClosureExpression::Ternary {
            condition: Box::new(desugar_expression(condition, tag_param)),
            if_true: Box::new(desugar_expression(if_true, tag_param)),
            if_false: Box::new(desugar_expression(if_false, tag_param)),
        },
        ClosureExpression::MethodCall {
            receiver,
            method,
            args,
            null_safe,
        } => ClosureExpression::MethodCall {
            receiver: Box::new(desugar_expression(receiver, tag_param)),
            method: method.clone(),
            args: args
                .iter()
                .map(|a| desugar_expression(a, tag_param))
                .collect(),
            null_safe: *null_safe,
        },
        ClosureExpression::StaticCall {
            type_name,
            method,
            args,
        } => ClosureExpression::StaticCall {
            type_name: type_name.clone(),
            method: method.clone(),
            args: args
                .iter()
                .map(|a| desugar_expression(a, tag_param))
                .collect(),
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_scalar_broadcast_lowering() {
        let program = transpile_expression(
            "vm.yaml",
            "meter_vm_cpu",
            "(cpu.sum(['svc']) * 100).service(['svc'], Layer.GENERAL)",
            false,
        )
        .unwrap();

        let OpNode::Call { receiver, op, .. } = &program.root else {
            panic!("expected a scope call at the root");
        };
        assert_eq!(&RuntimeOp::Service, op);

        let OpNode::Arithmetic { mode, .. } = receiver.as_ref() else {
            panic!("expected an arithmetic node");
        };
        assert_eq!(&ArithmeticMode::FamilyScalar, mode);

        assert_eq!(
            Some(ScopeBinding::Service {
                keys: vec!["svc".into()],
                layer: Layer::General,
            }),
            program.meta.scope
        );
        assert_eq!(vec![Box::<str>::from("svc")], program.meta.aggregation_labels);
    }

    #[test]
    fn test_missing_scope_is_fatal() {
        let error =
            transpile_expression("vm.yaml", "m", "cpu.sum(['svc'])", false).unwrap_err();

        assert!(matches!(error, TranspileError::MissingScope { .. }));
    }

    #[test]
    fn test_init_expression_is_exempt_from_scope() {
        let program = transpile_expression("vm.yaml", "m_init", "cpu.sum(['svc'])", true).unwrap();

        assert!(program.init);
        assert_eq!(None, program.meta.scope);
    }

    #[test]
    fn test_multiple_scopes_are_fatal() {
        let error = transpile_expression(
            "vm.yaml",
            "m",
            "cpu.service(['s'], Layer.GENERAL).service(['s'], Layer.GENERAL)",
            false,
        )
        .unwrap_err();

        // A second scope op after the first is caught as an op after the
        // scope binding.
        assert!(matches!(
            error,
            TranspileError::OperationAfterScope { .. } | TranspileError::MultipleScopes { .. }
        ));
    }

    #[test]
    fn test_only_decorate_and_downsampling_follow_scope() {
        assert!(transpile_expression(
            "vm.yaml",
            "m",
            "cpu.sum(['s']).service(['s'], Layer.GENERAL).downsampling(SUM)",
            false,
        )
        .is_ok());

        let error = transpile_expression(
            "vm.yaml",
            "m",
            "cpu.service(['s'], Layer.GENERAL).sum(['s'])",
            false,
        )
        .unwrap_err();
        assert!(matches!(error, TranspileError::OperationAfterScope { .. }));
    }

    #[test]
    fn test_unknown_function_is_fatal() {
        let error = transpile_expression(
            "vm.yaml",
            "m",
            "cpu.summ(['s']).service(['s'], Layer.GENERAL)",
            false,
        )
        .unwrap_err();

        assert!(matches!(error, TranspileError::UnknownFunction { name, .. } if name == "summ"));
    }

    #[test]
    fn test_histogram_percentile_requires_histogram() {
        let error = transpile_expression(
            "vm.yaml",
            "m",
            "lat.histogram_percentile([50]).service(['s'], Layer.GENERAL)",
            false,
        )
        .unwrap_err();

        assert!(matches!(error, TranspileError::BadArgument { .. }));

        let program = transpile_expression(
            "vm.yaml",
            "m",
            "lat.histogram().histogram_percentile([50, 99]).service(['s'], Layer.GENERAL)",
            false,
        )
        .unwrap();
        assert!(program.meta.histogram);
        assert_eq!(vec![50, 99], program.meta.percentiles);
    }

    #[test]
    fn test_closure_lifting_assigns_indices_and_desugars() {
        let program = transpile_expression(
            "vm.yaml",
            "m",
            "cpu.tag({ tags -> tags.host = 'h' }).filter({ tags -> tags.job == 'vm' }).sum(['host']).service(['host'], Layer.GENERAL)",
            false,
        )
        .unwrap();

        assert_eq!(2, program.closures.len());
        assert_eq!(ClosureContract::TagRewrite, program.closures[0].contract);
        assert_eq!(ClosureContract::FilterPredicate, program.closures[1].contract);

        // `tags.host = 'h'` was desugared to index assignment.
        let ClosureStatement::Assign { target, .. } =
            &program.closures[0].closure.get_body()[0]
        else {
            panic!("expected an assignment");
        };
        assert!(matches!(target, AssignmentTarget::Index { .. }));

        // `tags.job` on the predicate side became index access.
        let ClosureStatement::Expression { value, .. } =
            &program.closures[1].closure.get_body()[0]
        else {
            panic!("expected an expression statement");
        };
        let ClosureExpression::Binary { left, .. } = value else {
            panic!("expected a comparison");
        };
        assert!(matches!(left.as_ref(), ClosureExpression::Index { .. }));
    }

    #[test]
    fn test_invalid_tag_match_pattern_is_fatal() {
        let error = transpile_expression(
            "vm.yaml",
            "m",
            "cpu.tagMatch('status', '([').sum(['s']).service(['s'], Layer.GENERAL)",
            false,
        )
        .unwrap_err();

        assert!(matches!(error, TranspileError::InvalidRegex { .. }));
    }

    #[test]
    fn test_filter_literal_compiles_once_per_text() {
        let program =
            transpile_filter_literal("vm.yaml", "{ tags -> tags.job_name == 'vm-monitoring' }")
                .unwrap();

        assert_eq!("{ tags -> tags.job_name == 'vm-monitoring' }", program.literal);
        assert_eq!(1, program.closure.get_params().len());
    }
}
