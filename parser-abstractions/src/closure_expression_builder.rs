// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use pest::RuleType;
use pest::iterators::Pair;

use analysis_engine_model::{BinaryOp, ClosureExpression, UnaryOp};

use crate::{ParseError, to_source_location, unescape_string_literal};

/// Static receivers whose method calls are translated verbatim instead of
/// being dispatched on a runtime value.
const STATIC_CALL_RECEIVERS: &[&str] = &["ProcessRegistry"];

/// The closure expression sub-grammar is shared between the MAL and LAL
/// grammars, so this builder dispatches on rule names rather than on a
/// concrete `Rule` enum. Both grammars must use the shared rule names
/// (`cexpr`, `logical_or`, …).
pub fn rule_name<R: RuleType>(pair: &Pair<R>) -> String {
    format!("{:?}", pair.as_rule())
}

/// Build a `ClosureExpression` from a `cexpr` pair (or any pair of one of
/// its nested precedence levels).
pub fn build_closure_expression<R: RuleType>(
    file: &str,
    pair: Pair<R>,
) -> Result<ClosureExpression, ParseError> {
    match rule_name(&pair).as_str() {
        "cexpr" => build_cexpr(file, pair),
        "logical_or" | "logical_and" | "equality" | "comparison" | "additive"
        | "multiplicative" => build_binary_chain(file, pair),
        "unary_expr" => build_unary(file, pair),
        "postfix_expr" => build_postfix(file, pair),
        "primary_expr" => build_primary(file, pair),
        name => panic!("Unexpected rule in closure expression: {name}"),
    }
}

fn build_cexpr<R: RuleType>(file: &str, pair: Pair<R>) -> Result<ClosureExpression, ParseError> {
    let mut inner = pair.into_inner();

    let head = build_closure_expression(
        file,
        inner.next().expect("cexpr always has a condition operand"),
    )?;

    match inner.next() {
        None => Ok(head),
        Some(ternary) => {
            debug_assert_eq!("ternary_suffix", rule_name(&ternary));

            let mut arms = ternary.into_inner();
            let if_true = build_closure_expression(
                file,
                arms.next().expect("ternary suffix has a true arm"),
            )?;
            let if_false = build_closure_expression(
                file,
                arms.next().expect("ternary suffix has a false arm"),
            )?;

            Ok(ClosureExpression::Ternary {
                condition: Box::new(head),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            })
        }
    }
}

fn build_binary_chain<R: RuleType>(
    file: &str,
    pair: Pair<R>,
) -> Result<ClosureExpression, ParseError> {
    let mut inner = pair.into_inner();

    let mut left = build_closure_expression(
        file,
        inner.next().expect("binary chain has a first operand"),
    )?;

    while let Some(op_pair) = inner.next() {
        let op = binary_op_from_symbol(op_pair.as_str());
        let right = build_closure_expression(
            file,
            inner.next().expect("binary operator has a right operand"),
        )?;

        left = ClosureExpression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
    }

    Ok(left)
}

fn binary_op_from_symbol(symbol: &str) -> BinaryOp {
    match symbol {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Subtract,
        "*" => BinaryOp::Multiply,
        "/" => BinaryOp::Divide,
        "==" => BinaryOp::Equal,
        "!=" => BinaryOp::NotEqual,
        ">" => BinaryOp::GreaterThan,
        ">=" => BinaryOp::GreaterThanOrEqual,
        "<" => BinaryOp::LessThan,
        "<=" => BinaryOp::LessThanOrEqual,
        "&&" => BinaryOp::And,
        "||" => BinaryOp::Or,
        other => panic!("Unexpected binary operator: {other}"),
    }
}

fn build_unary<R: RuleType>(file: &str, pair: Pair<R>) -> Result<ClosureExpression, ParseError> {
    let mut ops = Vec::new();
    let mut operand = None;

    for child in pair.into_inner() {
        match rule_name(&child).as_str() {
            "unary_op" => ops.push(match child.as_str() {
                "!" => UnaryOp::Not,
                "-" => UnaryOp::Negate,
                other => panic!("Unexpected unary operator: {other}"),
            }),
            _ => operand = Some(build_closure_expression(file, child)?),
        }
    }

    let mut expression = operand.expect("unary expression has an operand");
    for op in ops.into_iter().rev() {
        expression = ClosureExpression::Unary {
            op,
            operand: Box::new(expression),
        };
    }

    Ok(expression)
}

fn build_postfix<R: RuleType>(file: &str, pair: Pair<R>) -> Result<ClosureExpression, ParseError> {
    let mut inner = pair.into_inner();

    let mut receiver = build_closure_expression(
        file,
        inner.next().expect("postfix expression has a primary"),
    )?;

    for op_pair in inner {
        receiver = match rule_name(&op_pair).as_str() {
            "safe_method_call" => apply_method_call(file, receiver, op_pair, true)?,
            "member_method_call" => apply_method_call(file, receiver, op_pair, false)?,
            "safe_property" => apply_property(receiver, op_pair, true),
            "member_property" => apply_property(receiver, op_pair, false),
            "index_access" => {
                let key = build_closure_expression(
                    file,
                    op_pair
                        .into_inner()
                        .next()
                        .expect("index access has a key expression"),
                )?;
                ClosureExpression::Index {
                    receiver: Box::new(receiver),
                    key: Box::new(key),
                }
            }
            name => panic!("Unexpected postfix rule: {name}"),
        };
    }

    Ok(receiver)
}

fn apply_method_call<R: RuleType>(
    file: &str,
    receiver: ClosureExpression,
    pair: Pair<R>,
    null_safe: bool,
) -> Result<ClosureExpression, ParseError> {
    let mut inner = pair.into_inner();
    let method: Box<str> = inner
        .next()
        .expect("method call has a name")
        .as_str()
        .into();

    let mut args = Vec::new();
    if let Some(list) = inner.next() {
        for arg in list.into_inner() {
            args.push(build_closure_expression(file, arg)?);
        }
    }

    if let ClosureExpression::Identifier(name) = &receiver
        && STATIC_CALL_RECEIVERS.iter().any(|r| *r == name.as_ref())
    {
        return Ok(ClosureExpression::StaticCall {
            type_name: name.clone(),
            method,
            args,
        });
    }

    Ok(ClosureExpression::MethodCall {
        receiver: Box::new(receiver),
        method,
        args,
        null_safe,
    })
}

fn apply_property<R: RuleType>(
    receiver: ClosureExpression,
    pair: Pair<R>,
    null_safe: bool,
) -> ClosureExpression {
    let name: Box<str> = pair
        .into_inner()
        .next()
        .expect("property access has a name")
        .as_str()
        .into();

    ClosureExpression::Property {
        receiver: Box::new(receiver),
        name,
        null_safe,
    }
}

fn build_primary<R: RuleType>(file: &str, pair: Pair<R>) -> Result<ClosureExpression, ParseError> {
    let inner = pair
        .into_inner()
        .next()
        .expect("primary expression has exactly one alternative");

    match rule_name(&inner).as_str() {
        "null_literal" => Ok(ClosureExpression::Null),
        "true_literal" => Ok(ClosureExpression::Boolean(true)),
        "false_literal" => Ok(ClosureExpression::Boolean(false)),
        "integer_literal" => {
            let value = inner.as_str().parse::<i64>().map_err(|_| {
                ParseError::new(
                    file,
                    &to_source_location(&inner),
                    format!("'{}' is not a valid integer", inner.as_str()),
                )
            })?;
            Ok(ClosureExpression::Integer(value))
        }
        "double_literal" => {
            let value = inner.as_str().parse::<f64>().map_err(|_| {
                ParseError::new(
                    file,
                    &to_source_location(&inner),
                    format!("'{}' is not a valid number", inner.as_str()),
                )
            })?;
            Ok(ClosureExpression::Double(value))
        }
        "string_literal" => Ok(ClosureExpression::Str(unescape_string_literal(&inner))),
        "paren_expr" => build_closure_expression(
            file,
            inner
                .into_inner()
                .next()
                .expect("parenthesized expression has an inner expression"),
        ),
        "identifier" => Ok(ClosureExpression::Identifier(inner.as_str().into())),
        name => panic!("Unexpected rule in primary expression: {name}"),
    }
}
