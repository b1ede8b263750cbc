// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod closure_builder;
pub(crate) mod expression_builder;
pub(crate) mod mal_parser;

pub use mal_parser::*;

// Note: Re-export the error type so users don't need to also depend on the
// parser-abstractions crate just to parse expressions.
pub use analysis_engine_parser_abstractions::ParseError;
