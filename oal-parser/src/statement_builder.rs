// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use pest::iterators::Pair;

use analysis_engine_model::{OalFile, OalFilter, OalFilterOp, OalLiteral, OalStatement};
use analysis_engine_parser_abstractions::{
    ParseError, to_source_location, unescape_string_literal,
};

use crate::Rule;

pub(crate) fn build_file(file: &str, pair: Pair<Rule>) -> Result<OalFile, ParseError> {
    debug_assert_eq!(Rule::oal_file, pair.as_rule());

    let mut statements = Vec::new();
    let mut disabled = Vec::new();

    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::metric_statement => statements.push(build_statement(file, child)?),
            Rule::disable_statement => {
                let name = child
                    .into_inner()
                    .nth(1)
                    .expect("disable statement has a source name");
                disabled.push(name.as_str().into());
            }
            Rule::EOI => {}
            rule => panic!("Unexpected rule in oal_file: {rule:?}"),
        }
    }

    Ok(OalFile::new(statements, disabled))
}

fn build_statement(file: &str, pair: Pair<Rule>) -> Result<OalStatement, ParseError> {
    let location = to_source_location(&pair);
    let mut inner = pair.into_inner();

    let metric_name: Box<str> = inner
        .next()
        .expect("statement has a metric name")
        .as_str()
        .into();

    let from_clause = inner.next().expect("statement has a from clause");
    let mut from_inner = from_clause.into_inner();
    from_inner.next().expect("from clause has its keyword");
    let source_name: Box<str> = from_inner
        .next()
        .expect("from clause has a source name")
        .as_str()
        .into();
    let projection_pair = from_inner
        .next()
        .expect("from clause has a projection")
        .into_inner()
        .next()
        .expect("projection has exactly one alternative");
    let projection_field: Option<Box<str>> = match projection_pair.as_rule() {
        Rule::star => None,
        Rule::identifier => Some(projection_pair.as_str().into()),
        rule => panic!("Unexpected rule in projection: {rule:?}"),
    };

    let function_call = inner.next().expect("statement has a function call");
    let mut call_inner = function_call.into_inner();
    let function: Box<str> = call_inner
        .next()
        .expect("function call has a name")
        .as_str()
        .into();
    let mut args = Vec::new();
    if let Some(list) = call_inner.next() {
        for literal in list.into_inner() {
            args.push(build_literal(file, literal)?);
        }
    }

    let mut filters = Vec::new();
    for filter_clause in inner {
        debug_assert_eq!(Rule::filter_clause, filter_clause.as_rule());
        let mut clause_inner = filter_clause.into_inner();
        clause_inner.next().expect("filter clause has its keyword");

        let field: Box<str> = clause_inner
            .next()
            .expect("filter clause has a field")
            .as_str()
            .into();
        let op_pair = clause_inner.next().expect("filter clause has an operator");
        let op = match op_pair.as_str() {
            "==" => OalFilterOp::Equal,
            "!=" => OalFilterOp::NotEqual,
            ">" => OalFilterOp::GreaterThan,
            ">=" => OalFilterOp::GreaterThanOrEqual,
            "<" => OalFilterOp::LessThan,
            "<=" => OalFilterOp::LessThanOrEqual,
            "like" => OalFilterOp::Like,
            "in" => OalFilterOp::In,
            other => panic!("Unexpected filter operator: {other}"),
        };
        let literal = build_literal(
            file,
            clause_inner.next().expect("filter clause has a literal"),
        )?;

        filters.push(OalFilter { field, op, literal });
    }

    Ok(OalStatement::new(
        metric_name,
        source_name,
        projection_field,
        function,
        args,
        filters,
        location,
    ))
}

fn build_literal(file: &str, pair: Pair<Rule>) -> Result<OalLiteral, ParseError> {
    debug_assert_eq!(Rule::oal_literal, pair.as_rule());

    let inner = pair
        .into_inner()
        .next()
        .expect("literal has exactly one alternative");

    match inner.as_rule() {
        Rule::true_literal => Ok(OalLiteral::Boolean(true)),
        Rule::false_literal => Ok(OalLiteral::Boolean(false)),
        Rule::number_literal => {
            let value = inner.as_str().parse::<f64>().map_err(|_| {
                ParseError::new(
                    file,
                    &to_source_location(&inner),
                    format!("'{}' is not a valid number", inner.as_str()),
                )
            })?;
            Ok(OalLiteral::Number(value))
        }
        Rule::string_literal => Ok(OalLiteral::Str(unescape_string_literal(&inner).into())),
        Rule::literal_list => {
            let mut entries = Vec::new();
            for entry in inner.into_inner() {
                entries.push(build_literal(file, entry)?);
            }
            Ok(OalLiteral::List(entries))
        }
        rule => panic!("Unexpected rule in oal_literal: {rule:?}"),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::OalParser;

    const CORE_SCRIPT: &str = r#"
# endpoint metrics
endpoint_avg = from(Endpoint.latency).longAvg()
endpoint_success = from(Endpoint.*).count() filter status == true

service_2xx = from(Service.responseCode).count() filter responseCode >= 200 filter responseCode < 300

disable(segment)
disable top_n_database_statement
"#;

    #[test]
    fn test_core_script() {
        let parsed = OalParser::parse_file("core.oal", CORE_SCRIPT).unwrap();

        assert_eq!(3, parsed.get_statements().len());
        assert_eq!(
            vec![Box::from("segment"), Box::from("top_n_database_statement")],
            parsed.get_disabled_sources().to_vec()
        );

        let avg = &parsed.get_statements()[0];
        assert_eq!("endpoint_avg", avg.get_metric_name());
        assert_eq!("Endpoint", avg.get_source_name());
        assert_eq!(Some("latency"), avg.get_projection_field());
        assert_eq!("longAvg", avg.get_function());
        assert!(avg.get_filters().is_empty());

        let success = &parsed.get_statements()[1];
        assert_eq!(None, success.get_projection_field());
        assert_eq!(1, success.get_filters().len());
        assert_eq!(OalFilterOp::Equal, success.get_filters()[0].op);
        assert_eq!(OalLiteral::Boolean(true), success.get_filters()[0].literal);

        let ranged = &parsed.get_statements()[2];
        assert_eq!(2, ranged.get_filters().len());
        assert_eq!(
            OalFilterOp::GreaterThanOrEqual,
            ranged.get_filters()[0].op
        );
        assert_eq!(OalLiteral::Number(300.0), ranged.get_filters()[1].literal);
    }

    #[test]
    fn test_filter_with_list_literal() {
        let parsed = OalParser::parse_file(
            "core.oal",
            "service_err = from(Service.*).count() filter responseCode in [500, 502, 503]",
        )
        .unwrap();

        let statement = &parsed.get_statements()[0];
        assert_eq!(OalFilterOp::In, statement.get_filters()[0].op);
        let OalLiteral::List(entries) = &statement.get_filters()[0].literal else {
            panic!("expected a list literal");
        };
        assert_eq!(3, entries.len());
    }
}
