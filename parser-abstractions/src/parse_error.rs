// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use pest::RuleType;
use pest::error::{Error, LineColLocation};
use thiserror::Error;

use analysis_engine_model::SourceLocation;

/// Lexical, syntactic, or semantic failure in a rule file. Every parser
/// fails fast on the first error and reports the file, line, column, and
/// message.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{file}:{line}:{column}: {message}")]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(file: &str, location: &SourceLocation, message: impl Into<String>) -> ParseError {
        let (line, column) = location.get_line_and_column_numbers();

        Self {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    pub fn from_pest_error<R: RuleType>(file: &str, pest_error: Error<R>) -> ParseError {
        let (line, column) = match pest_error.line_col {
            LineColLocation::Pos(p) => p,
            LineColLocation::Span(l, _) => l,
        };

        Self {
            file: file.into(),
            line,
            column,
            message: pest_error.variant.message().into_owned(),
        }
    }
}
