// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod closure;
pub(crate) mod enums;
pub(crate) mod lal;
pub(crate) mod mal;
pub(crate) mod manifest;
pub(crate) mod model_error;
pub(crate) mod oal;
pub(crate) mod program;
pub(crate) mod source_catalog;
pub(crate) mod source_location;

pub use closure::*;
pub use enums::*;
pub use lal::*;
pub use mal::*;
pub use manifest::*;
pub use model_error::ModelError;
pub use oal::*;
pub use program::*;
pub use source_catalog::*;
pub use source_location::SourceLocation;
