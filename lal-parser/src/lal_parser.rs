// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use pest::Parser as PestParser;
use pest_derive::Parser;

use analysis_engine_model::LalScript;
use analysis_engine_parser_abstractions::ParseError;

use crate::script_builder::build_script;

#[derive(Parser)]
#[grammar = "lal.pest"]
pub(crate) struct LalPestParser;

pub struct LalParser {}

impl LalParser {
    /// Parse one LAL DSL body (the `dsl` field of a rule entry).
    pub fn parse_script(file: &str, dsl: &str) -> Result<LalScript, ParseError> {
        let mut pairs = LalPestParser::parse(Rule::lal_script, dsl)
            .map_err(|e| ParseError::from_pest_error(file, e))?;

        build_script(
            file,
            pairs.next().expect("lal_script always produces one pair"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_parse() {
        assert!(
            LalParser::parse_script(
                "l.yaml",
                r#"filter { json {} extractor { tag status: parsed.status } }"#
            )
            .is_ok()
        );
        assert!(LalParser::parse_script("l.yaml", "extractor {}").is_err());
        assert!(LalParser::parse_script("l.yaml", "filter { json { } ").is_err());
    }
}
