// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use pest::iterators::Pair;

use analysis_engine_model::{
    AssignmentTarget, Closure, ClosureExpression, ClosureStatement, ConditionalBranch,
};
use analysis_engine_parser_abstractions::{
    ParseError, build_closure_expression, to_source_location,
};

use crate::Rule;

/// Build a `Closure` from a `closure` pair.
pub(crate) fn build_closure(file: &str, pair: Pair<Rule>) -> Result<Closure, ParseError> {
    debug_assert_eq!(Rule::closure, pair.as_rule());
    let location = to_source_location(&pair);
    let mut inner = pair.into_inner().peekable();

    let mut params = Vec::new();
    if let Some(first) = inner.peek()
        && first.as_rule() == Rule::closure_params
    {
        let params_pair = inner.next().expect("peeked params pair");
        for param in params_pair.into_inner() {
            params.push(param.as_str().into());
        }
    }

    let mut body = Vec::new();
    for statement in inner {
        body.push(build_statement(file, statement)?);
    }

    Ok(Closure::new(params, body, location))
}

pub(crate) fn build_statement(
    file: &str,
    pair: Pair<Rule>,
) -> Result<ClosureStatement, ParseError> {
    let location = to_source_location(&pair);

    match pair.as_rule() {
        Rule::declare_statement => {
            let mut inner = pair.into_inner();
            inner.next().expect("declaration has its def keyword");
            let name: Box<str> = inner
                .next()
                .expect("declaration has a name")
                .as_str()
                .into();
            inner.next().expect("declaration has an assignment operator");
            let value = build_closure_expression(
                file,
                inner.next().expect("declaration has an initializer"),
            )?;

            Ok(ClosureStatement::Declare {
                name,
                value,
                location,
            })
        }
        Rule::assign_statement => {
            let mut inner = pair.into_inner();
            let target = build_assignment_target(
                file,
                inner.next().expect("assignment has a target"),
            )?;
            inner.next().expect("assignment has an operator");
            let value = build_closure_expression(
                file,
                inner.next().expect("assignment has a value"),
            )?;

            Ok(ClosureStatement::Assign {
                target,
                value,
                location,
            })
        }
        Rule::return_statement => {
            let mut inner = pair.into_inner();
            inner.next().expect("return statement has its keyword");

            let value = match inner.next() {
                Some(p) => Some(build_closure_expression(file, p)?),
                None => None,
            };

            Ok(ClosureStatement::Return { value, location })
        }
        Rule::if_statement => build_if_statement(file, pair),
        Rule::expression_statement => {
            let value = build_closure_expression(
                file,
                pair.into_inner()
                    .next()
                    .expect("expression statement has an expression"),
            )?;

            Ok(ClosureStatement::Expression { value, location })
        }
        rule => panic!("Unexpected rule in closure statement: {rule:?}"),
    }
}

fn build_if_statement(file: &str, pair: Pair<Rule>) -> Result<ClosureStatement, ParseError> {
    let location = to_source_location(&pair);
    let mut branches = Vec::new();
    let mut else_body = Vec::new();

    let mut inner = pair.into_inner();
    inner.next().expect("if statement has its keyword");
    let condition = build_closure_expression(
        file,
        inner.next().expect("if statement has a condition"),
    )?;
    let body = build_block(file, inner.next().expect("if statement has a block"))?;
    branches.push(ConditionalBranch::new(condition, body));

    for clause in inner {
        match clause.as_rule() {
            Rule::else_if_clause => {
                let mut clause_inner = clause.into_inner();
                clause_inner.next().expect("else-if has its else keyword");
                clause_inner.next().expect("else-if has its if keyword");
                let condition = build_closure_expression(
                    file,
                    clause_inner.next().expect("else-if has a condition"),
                )?;
                let body =
                    build_block(file, clause_inner.next().expect("else-if has a block"))?;
                branches.push(ConditionalBranch::new(condition, body));
            }
            Rule::else_clause => {
                let mut clause_inner = clause.into_inner();
                clause_inner.next().expect("else clause has its keyword");
                else_body =
                    build_block(file, clause_inner.next().expect("else clause has a block"))?;
            }
            rule => panic!("Unexpected rule in if statement: {rule:?}"),
        }
    }

    Ok(ClosureStatement::If {
        branches,
        else_body,
        location,
    })
}

fn build_block(file: &str, pair: Pair<Rule>) -> Result<Vec<ClosureStatement>, ParseError> {
    debug_assert_eq!(Rule::statement_block, pair.as_rule());

    let mut statements = Vec::new();
    for statement in pair.into_inner() {
        statements.push(build_statement(file, statement)?);
    }

    Ok(statements)
}

fn build_assignment_target(
    file: &str,
    pair: Pair<Rule>,
) -> Result<AssignmentTarget, ParseError> {
    debug_assert_eq!(Rule::assignment_target, pair.as_rule());
    let mut inner = pair.into_inner();

    let root: Box<str> = inner
        .next()
        .expect("assignment target has a root identifier")
        .as_str()
        .into();

    let accessors: Vec<Pair<Rule>> = inner.collect();
    if accessors.is_empty() {
        return Ok(AssignmentTarget::Variable { name: root });
    }

    let mut receiver = ClosureExpression::Identifier(root);
    for accessor in &accessors[..accessors.len() - 1] {
        receiver = match accessor.as_rule() {
            Rule::target_index => ClosureExpression::Index {
                receiver: Box::new(receiver),
                key: Box::new(build_closure_expression(
                    file,
                    accessor
                        .clone()
                        .into_inner()
                        .next()
                        .expect("index accessor has a key"),
                )?),
            },
            Rule::target_property => ClosureExpression::Property {
                receiver: Box::new(receiver),
                name: accessor
                    .clone()
                    .into_inner()
                    .next()
                    .expect("property accessor has a name")
                    .as_str()
                    .into(),
                null_safe: false,
            },
            rule => panic!("Unexpected rule in assignment target: {rule:?}"),
        };
    }

    let last = accessors
        .last()
        .expect("assignment target has at least one accessor")
        .clone();
    match last.as_rule() {
        Rule::target_index => Ok(AssignmentTarget::Index {
            receiver,
            key: build_closure_expression(
                file,
                last.into_inner().next().expect("index accessor has a key"),
            )?,
        }),
        Rule::target_property => Ok(AssignmentTarget::Property {
            receiver,
            name: last
                .into_inner()
                .next()
                .expect("property accessor has a name")
                .as_str()
                .into(),
        }),
        rule => panic!("Unexpected rule in assignment target: {rule:?}"),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::MalParser;
    use analysis_engine_model::BinaryOp;

    #[test]
    fn test_tag_rewrite_closure() {
        let closure = MalParser::parse_filter(
            "t.yaml",
            "{ tags -> if (tags.host_name == null) { tags.host_name = 'unknown' } }",
        )
        .unwrap();

        assert_eq!(vec![Box::from("tags")], closure.get_params().to_vec());
        assert_eq!(1, closure.get_body().len());

        let ClosureStatement::If {
            branches, else_body, ..
        } = &closure.get_body()[0]
        else {
            panic!("expected an if statement");
        };
        assert_eq!(1, branches.len());
        assert!(else_body.is_empty());

        let ClosureExpression::Binary { op, .. } = branches[0].get_condition() else {
            panic!("expected a binary condition");
        };
        assert_eq!(&BinaryOp::Equal, op);
    }

    #[test]
    fn test_static_registry_call_is_recognized() {
        let closure = MalParser::parse_filter(
            "t.yaml",
            "{ tags -> def p = ProcessRegistry.generateVirtualLocalProcess(tags.service, tags.instance); tags.process = p }",
        )
        .unwrap();

        let ClosureStatement::Declare { value, .. } = &closure.get_body()[0] else {
            panic!("expected a declaration");
        };
        let ClosureExpression::StaticCall {
            type_name, method, args,
        } = value
        else {
            panic!("expected a static call");
        };

        assert_eq!("ProcessRegistry", type_name.as_ref());
        assert_eq!("generateVirtualLocalProcess", method.as_ref());
        assert_eq!(2, args.len());
    }

    #[test]
    fn test_null_safe_navigation_chain() {
        let closure = MalParser::parse_filter(
            "t.yaml",
            "{ tags -> tags.region = tags?.metadata?.region }",
        )
        .unwrap();

        let ClosureStatement::Assign { value, .. } = &closure.get_body()[0] else {
            panic!("expected an assignment");
        };
        let ClosureExpression::Property {
            name, null_safe, ..
        } = value
        else {
            panic!("expected a property access");
        };
        assert_eq!("region", name.as_ref());
        assert!(*null_safe);
    }
}
