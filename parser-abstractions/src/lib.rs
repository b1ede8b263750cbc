// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod closure_expression_builder;
pub(crate) mod parse_error;
pub(crate) mod pest_helpers;

pub use closure_expression_builder::{build_closure_expression, rule_name};
pub use parse_error::ParseError;
pub use pest_helpers::*;
