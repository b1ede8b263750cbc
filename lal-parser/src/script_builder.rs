// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use pest::iterators::Pair;

use analysis_engine_model::{
    ExtractorStep, FilterBlock, FilterStep, GString, GStringPart, LalConditionalBranch,
    LalExtractorBranch, LalScript, MetricSpec, SampledTraceSpec, SamplerSpec,
};
use analysis_engine_parser_abstractions::{
    ParseError, build_closure_expression, to_source_location, unescape_string_literal,
};

use crate::Rule;

pub(crate) fn build_script(file: &str, pair: Pair<Rule>) -> Result<LalScript, ParseError> {
    debug_assert_eq!(Rule::lal_script, pair.as_rule());

    let mut filters = Vec::new();
    for child in pair.into_inner() {
        if child.as_rule() == Rule::filter_block {
            filters.push(build_filter_block(file, child)?);
        }
    }

    Ok(LalScript::new(filters))
}

fn build_filter_block(file: &str, pair: Pair<Rule>) -> Result<FilterBlock, ParseError> {
    let location = to_source_location(&pair);
    let mut inner = pair.into_inner();
    inner.next().expect("filter block has its keyword");

    let mut steps = Vec::new();
    for step in inner {
        steps.push(build_filter_step(file, step)?);
    }

    Ok(FilterBlock::new(steps, location))
}

fn build_filter_step(file: &str, pair: Pair<Rule>) -> Result<FilterStep, ParseError> {
    let location = to_source_location(&pair);

    match pair.as_rule() {
        Rule::json_step => Ok(FilterStep::Json { location }),
        Rule::text_step => {
            let mut inner = pair.into_inner();
            inner.next().expect("text step has its keyword");
            inner.next().expect("text step has its regexp keyword");
            let pattern = inner.next().expect("text step has a pattern literal");

            Ok(FilterStep::Text {
                regexp: unescape_string_literal(&pattern),
                location,
            })
        }
        Rule::extractor_step => {
            let mut inner = pair.into_inner();
            inner.next().expect("extractor step has its keyword");

            let mut steps = Vec::new();
            for entry in inner {
                steps.push(build_extractor_step(file, entry)?);
            }

            Ok(FilterStep::Extractor { steps, location })
        }
        Rule::sink_step => {
            let mut inner = pair.into_inner();
            inner.next().expect("sink step has its keyword");

            let sampler = match inner.next() {
                Some(block) => Some(build_sampler(file, block)?),
                None => None,
            };

            Ok(FilterStep::Sink { sampler, location })
        }
        Rule::abort_step => Ok(FilterStep::Abort { location }),
        Rule::filter_if => {
            let mut inner = pair.into_inner();
            inner.next().expect("if step has its keyword");
            let condition = build_closure_expression(
                file,
                inner.next().expect("if step has a condition"),
            )?;
            let steps =
                build_filter_branch(file, inner.next().expect("if step has a branch"))?;

            let mut branches = vec![LalConditionalBranch::new(condition, steps)];
            let mut else_steps = Vec::new();

            for clause in inner {
                match clause.as_rule() {
                    Rule::filter_else_if => {
                        let mut clause_inner = clause.into_inner();
                        clause_inner.next().expect("else-if has its else keyword");
                        clause_inner.next().expect("else-if has its if keyword");
                        let condition = build_closure_expression(
                            file,
                            clause_inner.next().expect("else-if has a condition"),
                        )?;
                        let steps = build_filter_branch(
                            file,
                            clause_inner.next().expect("else-if has a branch"),
                        )?;
                        branches.push(LalConditionalBranch::new(condition, steps));
                    }
                    Rule::filter_else => {
                        let mut clause_inner = clause.into_inner();
                        clause_inner.next().expect("else has its keyword");
                        else_steps = build_filter_branch(
                            file,
                            clause_inner.next().expect("else has a branch"),
                        )?;
                    }
                    rule => panic!("Unexpected rule in filter if: {rule:?}"),
                }
            }

            Ok(FilterStep::If {
                branches,
                else_steps,
                location,
            })
        }
        rule => panic!("Unexpected rule in filter step: {rule:?}"),
    }
}

fn build_filter_branch(file: &str, pair: Pair<Rule>) -> Result<Vec<FilterStep>, ParseError> {
    debug_assert_eq!(Rule::filter_branch, pair.as_rule());

    let mut steps = Vec::new();
    for step in pair.into_inner() {
        steps.push(build_filter_step(file, step)?);
    }

    Ok(steps)
}

fn build_extractor_step(file: &str, pair: Pair<Rule>) -> Result<ExtractorStep, ParseError> {
    let location = to_source_location(&pair);

    match pair.as_rule() {
        Rule::tag_entry => {
            let mut inner = pair.into_inner();
            inner.next().expect("tag entry has its keyword");
            let key: Box<str> = inner.next().expect("tag entry has a key").as_str().into();
            let value = build_closure_expression(
                file,
                inner.next().expect("tag entry has a value expression"),
            )?;

            Ok(ExtractorStep::Tag {
                key,
                value,
                location,
            })
        }
        Rule::metric_block => {
            let spec = build_metric_spec(file, pair)?;
            Ok(ExtractorStep::Metric { spec, location })
        }
        Rule::sampled_trace_block => {
            let spec = build_sampled_trace_spec(file, pair)?;

            if spec.is_empty() {
                return Err(ParseError::new(
                    file,
                    &location,
                    "sampledTrace requires at least one of latency, uri, or reason",
                ));
            }

            Ok(ExtractorStep::SampledTrace { spec, location })
        }
        Rule::extractor_if => {
            let mut inner = pair.into_inner();
            inner.next().expect("if entry has its keyword");
            let condition = build_closure_expression(
                file,
                inner.next().expect("if entry has a condition"),
            )?;
            let steps =
                build_extractor_branch(file, inner.next().expect("if entry has a branch"))?;

            let mut branches = vec![LalExtractorBranch::new(condition, steps)];
            let mut else_steps = Vec::new();

            for clause in inner {
                match clause.as_rule() {
                    Rule::extractor_else_if => {
                        let mut clause_inner = clause.into_inner();
                        clause_inner.next().expect("else-if has its else keyword");
                        clause_inner.next().expect("else-if has its if keyword");
                        let condition = build_closure_expression(
                            file,
                            clause_inner.next().expect("else-if has a condition"),
                        )?;
                        let steps = build_extractor_branch(
                            file,
                            clause_inner.next().expect("else-if has a branch"),
                        )?;
                        branches.push(LalExtractorBranch::new(condition, steps));
                    }
                    Rule::extractor_else => {
                        let mut clause_inner = clause.into_inner();
                        clause_inner.next().expect("else has its keyword");
                        else_steps = build_extractor_branch(
                            file,
                            clause_inner.next().expect("else has a branch"),
                        )?;
                    }
                    rule => panic!("Unexpected rule in extractor if: {rule:?}"),
                }
            }

            Ok(ExtractorStep::If {
                branches,
                else_steps,
                location,
            })
        }
        rule => panic!("Unexpected rule in extractor entry: {rule:?}"),
    }
}

fn build_extractor_branch(
    file: &str,
    pair: Pair<Rule>,
) -> Result<Vec<ExtractorStep>, ParseError> {
    debug_assert_eq!(Rule::extractor_branch, pair.as_rule());

    let mut steps = Vec::new();
    for step in pair.into_inner() {
        steps.push(build_extractor_step(file, step)?);
    }

    Ok(steps)
}

fn build_metric_spec(file: &str, pair: Pair<Rule>) -> Result<MetricSpec, ParseError> {
    let location = to_source_location(&pair);
    let mut inner = pair.into_inner();
    inner.next().expect("metric block has its keyword");

    let mut name = None;
    let mut timestamp = None;
    let mut labels = Vec::new();
    let mut value = None;

    for field in inner {
        match field.as_rule() {
            Rule::metric_name => {
                let mut field_inner = field.into_inner();
                field_inner.next().expect("name field has its keyword");
                name = Some(build_closure_expression(
                    file,
                    field_inner.next().expect("name field has an expression"),
                )?);
            }
            Rule::metric_timestamp => {
                let mut field_inner = field.into_inner();
                field_inner.next().expect("timestamp field has its keyword");
                timestamp = Some(build_closure_expression(
                    file,
                    field_inner.next().expect("timestamp field has an expression"),
                )?);
            }
            Rule::metric_labels => {
                let mut field_inner = field.into_inner();
                field_inner.next().expect("labels field has its keyword");
                for entry in field_inner {
                    let mut entry_inner = entry.into_inner();
                    let key: Box<str> = entry_inner
                        .next()
                        .expect("label entry has a key")
                        .as_str()
                        .into();
                    let label_value = build_closure_expression(
                        file,
                        entry_inner.next().expect("label entry has a value"),
                    )?;
                    labels.push((key, label_value));
                }
            }
            Rule::metric_value => {
                let mut field_inner = field.into_inner();
                field_inner.next().expect("value field has its keyword");
                value = Some(build_closure_expression(
                    file,
                    field_inner.next().expect("value field has an expression"),
                )?);
            }
            rule => panic!("Unexpected rule in metric block: {rule:?}"),
        }
    }

    let name = name.ok_or_else(|| ParseError::new(file, &location, "metric requires a name"))?;
    let value =
        value.ok_or_else(|| ParseError::new(file, &location, "metric requires a value"))?;

    Ok(MetricSpec {
        name,
        timestamp,
        labels,
        value,
    })
}

fn build_sampled_trace_spec(
    file: &str,
    pair: Pair<Rule>,
) -> Result<SampledTraceSpec, ParseError> {
    let mut inner = pair.into_inner();
    inner.next().expect("sampledTrace block has its keyword");

    let mut spec = SampledTraceSpec::default();

    for field in inner {
        let rule = field.as_rule();
        let mut field_inner = field.into_inner();
        field_inner.next().expect("sampledTrace field has its keyword");
        let expression = build_closure_expression(
            file,
            field_inner.next().expect("sampledTrace field has an expression"),
        )?;

        match rule {
            Rule::latency_field => spec.latency = Some(expression),
            Rule::uri_field => spec.uri = Some(expression),
            Rule::reason_field => spec.reason = Some(expression),
            rule => panic!("Unexpected rule in sampledTrace block: {rule:?}"),
        }
    }

    Ok(spec)
}

fn build_sampler(file: &str, pair: Pair<Rule>) -> Result<SamplerSpec, ParseError> {
    debug_assert_eq!(Rule::sampler_block, pair.as_rule());
    let mut inner = pair.into_inner();
    inner.next().expect("sampler block has its keyword");

    let rate_limit = inner.next().expect("sampler block has a rateLimit block");
    let mut rate_limit_inner = rate_limit.into_inner();
    rate_limit_inner.next().expect("rateLimit has its keyword");

    let key = build_gstring(
        file,
        rate_limit_inner.next().expect("rateLimit has a key gstring"),
    )?;

    let rpm_field = rate_limit_inner.next().expect("rateLimit has an rpm field");
    let mut rpm_inner = rpm_field.into_inner();
    rpm_inner.next().expect("rpm field has its keyword");
    let rpm_pair = rpm_inner.next().expect("rpm field has a value");
    let rpm = rpm_pair.as_str().parse::<u32>().map_err(|_| {
        ParseError::new(
            file,
            &to_source_location(&rpm_pair),
            format!("'{}' is not a valid rpm value", rpm_pair.as_str()),
        )
    })?;

    Ok(SamplerSpec {
        rate_limit_key: key,
        rpm,
    })
}

fn build_gstring(file: &str, pair: Pair<Rule>) -> Result<GString, ParseError> {
    debug_assert_eq!(Rule::gstring, pair.as_rule());

    let mut parts = Vec::new();
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::gstring_text => parts.push(GStringPart::Literal(part.as_str().into())),
            Rule::gstring_interpolation => {
                let expression = build_closure_expression(
                    file,
                    part.into_inner()
                        .next()
                        .expect("interpolation has an expression"),
                )?;
                parts.push(GStringPart::Expression(expression));
            }
            rule => panic!("Unexpected rule in gstring: {rule:?}"),
        }
    }

    Ok(GString::new(parts))
}
