// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use pest::Parser as PestParser;
use pest_derive::Parser;

use analysis_engine_model::OalFile;
use analysis_engine_parser_abstractions::ParseError;

use crate::statement_builder::build_file;

#[derive(Parser)]
#[grammar = "oal.pest"]
pub(crate) struct OalPestParser;

pub struct OalParser {}

impl OalParser {
    /// Parse one OAL script file.
    pub fn parse_file(file: &str, script: &str) -> Result<OalFile, ParseError> {
        let mut pairs = OalPestParser::parse(Rule::oal_file, script)
            .map_err(|e| ParseError::from_pest_error(file, e))?;

        build_file(
            file,
            pairs.next().expect("oal_file always produces one pair"),
        )
    }
}
