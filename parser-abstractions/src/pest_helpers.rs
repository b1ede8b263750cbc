// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use pest::RuleType;
use pest::iterators::Pair;

use analysis_engine_model::SourceLocation;

use crate::ParseError;

/// Use a pest pair to create a `SourceLocation`.
pub fn to_source_location<R: RuleType>(pair: &Pair<R>) -> SourceLocation {
    let span = pair.as_span();
    let (line, column) = pair.line_col();
    SourceLocation::new(span.start(), span.end(), line, column)
}

/// Unescape a quoted string literal as it comes in from pest:
/// * `'some \' string'` -> `some ' string`
/// * `"some \" string"` -> `some " string`
///
/// The pair's text includes the surrounding quotes.
pub fn unescape_string_literal<R: RuleType>(pair: &Pair<R>) -> Box<str> {
    let raw = pair.as_str();
    debug_assert!(raw.len() >= 2, "string literal includes its quotes");

    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => break,
        }
    }

    out.into()
}

/// Parse a numeric literal pair as `f64`, reporting a located error on
/// overflow or malformed input.
pub fn parse_number_literal<R: RuleType>(file: &str, pair: &Pair<R>) -> Result<f64, ParseError> {
    pair.as_str().parse::<f64>().map_err(|_| {
        ParseError::new(
            file,
            &to_source_location(pair),
            format!("'{}' is not a valid number", pair.as_str()),
        )
    })
}

/// Parse an integer literal pair as `i64`.
pub fn parse_integer_literal<R: RuleType>(file: &str, pair: &Pair<R>) -> Result<i64, ParseError> {
    pair.as_str().parse::<i64>().map_err(|_| {
        ParseError::new(
            file,
            &to_source_location(pair),
            format!("'{}' is not a valid integer", pair.as_str()),
        )
    })
}
