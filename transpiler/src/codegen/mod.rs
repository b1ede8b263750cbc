// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod lal;
pub(crate) mod literals;
pub(crate) mod mal;
pub(crate) mod oal;
pub(crate) mod writer;

pub use lal::render_lal_script;
pub use mal::{render_mal_expression, render_mal_filter};
pub use oal::{render_oal_dispatcher, render_oal_metric};

/// Banner every generated artifact starts with.
pub(crate) const GENERATED_HEADER: &str =
    "// @generated by the analysis engine transpiler. Do not edit.\n";
