// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::SourceLocation;

/// A parsed OAL script file: statements in definition order plus the set of
/// sources named by `disable` lines.
#[derive(Debug, Clone, PartialEq)]
pub struct OalFile {
    statements: Vec<OalStatement>,
    disabled_sources: Vec<Box<str>>,
}

impl OalFile {
    pub fn new(statements: Vec<OalStatement>, disabled_sources: Vec<Box<str>>) -> OalFile {
        Self {
            statements,
            disabled_sources,
        }
    }

    pub fn get_statements(&self) -> &[OalStatement] {
        &self.statements
    }

    pub fn get_disabled_sources(&self) -> &[Box<str>] {
        &self.disabled_sources
    }
}

/// `metric = from(Source.field).func(args) [filter field op literal]…`
#[derive(Debug, Clone, PartialEq)]
pub struct OalStatement {
    metric_name: Box<str>,
    source_name: Box<str>,
    /// `None` when the projection is `*` (every matching source counts as 1).
    projection_field: Option<Box<str>>,
    function: Box<str>,
    args: Vec<OalLiteral>,
    filters: Vec<OalFilter>,
    location: SourceLocation,
}

impl OalStatement {
    pub fn new(
        metric_name: Box<str>,
        source_name: Box<str>,
        projection_field: Option<Box<str>>,
        function: Box<str>,
        args: Vec<OalLiteral>,
        filters: Vec<OalFilter>,
        location: SourceLocation,
    ) -> OalStatement {
        Self {
            metric_name,
            source_name,
            projection_field,
            function,
            args,
            filters,
            location,
        }
    }

    pub fn get_metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn get_source_name(&self) -> &str {
        &self.source_name
    }

    pub fn get_projection_field(&self) -> Option<&str> {
        self.projection_field.as_deref()
    }

    pub fn get_function(&self) -> &str {
        &self.function
    }

    pub fn get_args(&self) -> &[OalLiteral] {
        &self.args
    }

    pub fn get_filters(&self) -> &[OalFilter] {
        &self.filters
    }

    pub fn get_location(&self) -> &SourceLocation {
        &self.location
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OalFilter {
    pub field: Box<str>,
    pub op: OalFilterOp,
    pub literal: OalLiteral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OalFilterOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    In,
}

impl OalFilterOp {
    pub fn get_symbol(&self) -> &'static str {
        match self {
            OalFilterOp::Equal => "==",
            OalFilterOp::NotEqual => "!=",
            OalFilterOp::GreaterThan => ">",
            OalFilterOp::GreaterThanOrEqual => ">=",
            OalFilterOp::LessThan => "<",
            OalFilterOp::LessThanOrEqual => "<=",
            OalFilterOp::Like => "like",
            OalFilterOp::In => "in",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OalLiteral {
    Boolean(bool),
    Number(f64),
    Str(String),
    List(Vec<OalLiteral>),
}
