// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use pest::Parser as PestParser;
use pest_derive::Parser;

use analysis_engine_model::{Closure, MalExpression};
use analysis_engine_parser_abstractions::ParseError;

use crate::closure_builder::build_closure;
use crate::expression_builder::build_expression;

#[derive(Parser)]
#[grammar = "mal.pest"]
pub(crate) struct MalPestParser;

pub struct MalParser {}

impl MalParser {
    /// Parse one composed MAL expression.
    pub fn parse_expression(file: &str, expression: &str) -> Result<MalExpression, ParseError> {
        let mut pairs = MalPestParser::parse(Rule::mal_expression, expression)
            .map_err(|e| ParseError::from_pest_error(file, e))?;

        let root = pairs
            .next()
            .expect("mal_expression always produces one pair")
            .into_inner()
            .next()
            .expect("mal_expression wraps an expression");

        build_expression(file, root)
    }

    /// Parse a file-level filter literal, which is a bare closure over the
    /// sample tag map.
    pub fn parse_filter(file: &str, literal: &str) -> Result<Closure, ParseError> {
        let mut pairs = MalPestParser::parse(Rule::mal_filter, literal)
            .map_err(|e| ParseError::from_pest_error(file, e))?;

        let root = pairs
            .next()
            .expect("mal_filter always produces one pair")
            .into_inner()
            .next()
            .expect("mal_filter wraps a closure");

        build_closure(file, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_parse() {
        assert!(MalParser::parse_expression("t.yaml", "a.sum(['x']).service(['x'], Layer.GENERAL)").is_ok());
        assert!(MalParser::parse_expression("t.yaml", "a..sum()").is_err());
        assert!(MalParser::parse_expression("t.yaml", "a.sum(['x']").is_err());
        assert!(MalParser::parse_filter("t.yaml", "{ tags -> tags.job == 'vm' }").is_ok());
        assert!(MalParser::parse_filter("t.yaml", "tags.job == 'vm'").is_err());
    }

    #[test]
    pub fn test_parse_error_carries_location() {
        let error = MalParser::parse_expression("rules/vm.yaml", "a.sum(['x']").unwrap_err();

        assert_eq!("rules/vm.yaml", error.file);
        assert_eq!(1, error.line);
    }
}
