// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use pest::iterators::Pair;

use analysis_engine_model::{
    ArithmeticOp, DownsamplingType, K8sRetagType, Layer, MalExpression, MalParameter,
};
use analysis_engine_parser_abstractions::{
    ParseError, to_source_location, unescape_string_literal,
};

use crate::Rule;
use crate::closure_builder::build_closure;

/// Build a `MalExpression` from an `expression` pair.
pub(crate) fn build_expression(file: &str, pair: Pair<Rule>) -> Result<MalExpression, ParseError> {
    debug_assert_eq!(Rule::expression, pair.as_rule());
    build_additive_chain(file, pair)
}

fn build_additive_chain(file: &str, pair: Pair<Rule>) -> Result<MalExpression, ParseError> {
    let location = to_source_location(&pair);
    let mut inner = pair.into_inner();

    let mut left =
        build_multiplicative_chain(file, inner.next().expect("expression has a first term"))?;

    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "+" => ArithmeticOp::Add,
            "-" => ArithmeticOp::Subtract,
            other => panic!("Unexpected arithmetic operator: {other}"),
        };

        let right =
            build_multiplicative_chain(file, inner.next().expect("operator has a right operand"))?;

        left = MalExpression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
            location: location.clone(),
        };
    }

    Ok(left)
}

fn build_multiplicative_chain(file: &str, pair: Pair<Rule>) -> Result<MalExpression, ParseError> {
    debug_assert_eq!(Rule::term, pair.as_rule());
    let location = to_source_location(&pair);
    let mut inner = pair.into_inner();

    let mut left = build_factor(file, inner.next().expect("term has a first factor"))?;

    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "*" => ArithmeticOp::Multiply,
            "/" => ArithmeticOp::Divide,
            other => panic!("Unexpected arithmetic operator: {other}"),
        };

        let right = build_factor(file, inner.next().expect("operator has a right operand"))?;

        left = MalExpression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
            location: location.clone(),
        };
    }

    Ok(left)
}

fn build_factor(file: &str, pair: Pair<Rule>) -> Result<MalExpression, ParseError> {
    debug_assert_eq!(Rule::factor, pair.as_rule());
    let mut inner = pair.into_inner();

    let primary = inner.next().expect("factor has a primary");
    let mut receiver = build_primary(file, primary)?;

    for call in inner {
        debug_assert_eq!(Rule::mal_method_call, call.as_rule());
        let location = to_source_location(&call);
        let mut call_inner = call.into_inner();

        let method: Box<str> = call_inner
            .next()
            .expect("method call has a name")
            .as_str()
            .into();

        let mut args = Vec::new();
        if let Some(list) = call_inner.next() {
            for parameter in list.into_inner() {
                args.push(build_parameter(file, parameter)?);
            }
        }

        receiver = MalExpression::MethodCall {
            receiver: Box::new(receiver),
            method,
            args,
            location,
        };
    }

    Ok(receiver)
}

fn build_primary(file: &str, pair: Pair<Rule>) -> Result<MalExpression, ParseError> {
    debug_assert_eq!(Rule::mal_primary, pair.as_rule());
    let location = to_source_location(&pair);

    let inner = pair
        .into_inner()
        .next()
        .expect("primary has exactly one alternative");

    match inner.as_rule() {
        Rule::double_literal | Rule::integer_literal => {
            let value = inner.as_str().parse::<f64>().map_err(|_| {
                ParseError::new(
                    file,
                    &to_source_location(&inner),
                    format!("'{}' is not a valid number", inner.as_str()),
                )
            })?;

            Ok(MalExpression::Number { value, location })
        }
        Rule::mal_paren => build_additive_chain(
            file,
            inner
                .into_inner()
                .next()
                .expect("parenthesized expression has an inner expression"),
        ),
        Rule::identifier => Ok(MalExpression::SampleRef {
            name: inner.as_str().into(),
            location,
        }),
        rule => panic!("Unexpected rule in mal_primary: {rule:?}"),
    }
}

fn build_parameter(file: &str, pair: Pair<Rule>) -> Result<MalParameter, ParseError> {
    debug_assert_eq!(Rule::mal_parameter, pair.as_rule());

    let inner = pair
        .into_inner()
        .next()
        .expect("parameter has exactly one alternative");

    match inner.as_rule() {
        Rule::closure => Ok(MalParameter::Closure(build_closure(file, inner)?)),
        Rule::layer_ref => {
            let name_pair = inner
                .into_inner()
                .next()
                .expect("layer reference has a variant name");
            let layer = Layer::try_from(name_pair.as_str()).map_err(|e| {
                ParseError::new(file, &to_source_location(&name_pair), e.to_string())
            })?;
            Ok(MalParameter::Layer(layer))
        }
        Rule::retag_type_ref => {
            let name_pair = inner
                .into_inner()
                .next()
                .expect("retag type reference has a variant name");
            let retag_type = K8sRetagType::try_from(name_pair.as_str()).map_err(|e| {
                ParseError::new(file, &to_source_location(&name_pair), e.to_string())
            })?;
            Ok(MalParameter::K8sRetagType(retag_type))
        }
        Rule::downsampling_ref => {
            let downsampling = DownsamplingType::try_from(inner.as_str())
                .map_err(|e| ParseError::new(file, &to_source_location(&inner), e.to_string()))?;
            Ok(MalParameter::Downsampling(downsampling))
        }
        Rule::string_list => {
            let mut values = Vec::new();
            for entry in inner.into_inner() {
                values.push(unescape_string_literal(&entry));
            }
            Ok(MalParameter::StringList(values))
        }
        Rule::number_list => {
            let mut values = Vec::new();
            for entry in inner.into_inner() {
                values.push(entry.as_str().parse::<i64>().map_err(|_| {
                    ParseError::new(
                        file,
                        &to_source_location(&entry),
                        format!("'{}' is not a valid integer", entry.as_str()),
                    )
                })?);
            }
            Ok(MalParameter::NumberList(values))
        }
        Rule::string_literal => Ok(MalParameter::Str(unescape_string_literal(&inner))),
        Rule::signed_number => {
            let value = inner.as_str().parse::<f64>().map_err(|_| {
                ParseError::new(
                    file,
                    &to_source_location(&inner),
                    format!("'{}' is not a valid number", inner.as_str()),
                )
            })?;
            Ok(MalParameter::Number(value))
        }
        rule => panic!("Unexpected rule in mal_parameter: {rule:?}"),
    }
}
