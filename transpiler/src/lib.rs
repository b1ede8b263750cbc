// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod codegen;
pub(crate) mod compose;
pub(crate) mod distribution;
pub(crate) mod lal_transpiler;
pub(crate) mod mal_transpiler;
pub(crate) mod manifest_writer;
pub(crate) mod oal_emitter;
pub(crate) mod rules;
pub(crate) mod transpile_error;

pub use compose::{compose_expression, sha256_hex};
pub use distribution::{DistributionBuilder, DistributionOutput};
pub use lal_transpiler::transpile_lal_script;
pub use mal_transpiler::{transpile_expression, transpile_filter_literal};
pub use manifest_writer::ManifestSet;
pub use oal_emitter::{OalEmission, OalEmitter};
pub use rules::{load_lal_rules, load_metric_rules};
pub use transpile_error::TranspileError;
