// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod oal_parser;
pub(crate) mod statement_builder;

pub use oal_parser::*;

// Note: Re-export the error type so users don't need to also depend on the
// parser-abstractions crate just to parse scripts.
pub use analysis_engine_parser_abstractions::ParseError;
