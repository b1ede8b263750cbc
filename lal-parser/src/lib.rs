// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod lal_parser;
pub(crate) mod script_builder;

pub use lal_parser::*;

// Note: Re-export the error type so users don't need to also depend on the
// parser-abstractions crate just to parse scripts.
pub use analysis_engine_parser_abstractions::ParseError;
