// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Failure raised while evaluating a compiled expression, closure, or
/// script. These never propagate out of an expression run: the expression
/// degrades to `EMPTY` and the failure is logged at debug level.
#[derive(Error, Debug)]
pub enum Error {
    #[error("null value dereferenced while reading '{0}'")]
    NullDereference(String),

    #[error("'{0}' is not defined in this closure")]
    UnknownIdentifier(Box<str>),

    #[error("{0}")]
    TypeMismatch(String),

    #[error("method '{0}' is not supported on this value")]
    UnsupportedMethod(Box<str>),

    #[error("static call '{0}.{1}' is not whitelisted")]
    UnsupportedStaticCall(Box<str>, Box<str>),

    #[error("failed to compile regex: {0}")]
    RegexError(#[source] regex::Error),

    #[error("'{0}' is not a valid ISO-8601 window")]
    InvalidWindow(String),

    #[error("closure does not satisfy its contract: {0}")]
    ClosureContract(String),

    #[error("assignment target cannot be resolved: {0}")]
    InvalidAssignment(String),
}
