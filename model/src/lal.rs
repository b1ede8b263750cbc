// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{ClosureExpression, SourceLocation};

/// A parsed LAL script: the ordered list of top-level `filter { … }` blocks
/// of one DSL body.
#[derive(Debug, Clone, PartialEq)]
pub struct LalScript {
    filters: Vec<FilterBlock>,
}

impl LalScript {
    pub fn new(filters: Vec<FilterBlock>) -> LalScript {
        Self { filters }
    }

    pub fn get_filters(&self) -> &[FilterBlock] {
        &self.filters
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterBlock {
    steps: Vec<FilterStep>,
    location: SourceLocation,
}

impl FilterBlock {
    pub fn new(steps: Vec<FilterStep>, location: SourceLocation) -> FilterBlock {
        Self { steps, location }
    }

    pub fn get_steps(&self) -> &[FilterStep] {
        &self.steps
    }

    pub fn get_location(&self) -> &SourceLocation {
        &self.location
    }
}

/// One step inside a `filter` body, executed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterStep {
    /// `json {}`: parse the log body as JSON into `parsed`.
    Json { location: SourceLocation },

    /// `text { regexp "…" }`: parse the log body with named captures into
    /// `parsed`.
    Text {
        regexp: Box<str>,
        location: SourceLocation,
    },

    Extractor {
        steps: Vec<ExtractorStep>,
        location: SourceLocation,
    },

    Sink {
        sampler: Option<SamplerSpec>,
        location: SourceLocation,
    },

    /// `abort {}`: stop processing this record.
    Abort { location: SourceLocation },

    If {
        branches: Vec<LalConditionalBranch>,
        else_steps: Vec<FilterStep>,
        location: SourceLocation,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LalConditionalBranch {
    condition: ClosureExpression,
    steps: Vec<FilterStep>,
}

impl LalConditionalBranch {
    pub fn new(condition: ClosureExpression, steps: Vec<FilterStep>) -> LalConditionalBranch {
        Self { condition, steps }
    }

    pub fn get_condition(&self) -> &ClosureExpression {
        &self.condition
    }

    pub fn get_steps(&self) -> &[FilterStep] {
        &self.steps
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorStep {
    /// `tag key : expr`
    Tag {
        key: Box<str>,
        value: ClosureExpression,
        location: SourceLocation,
    },

    Metric {
        spec: MetricSpec,
        location: SourceLocation,
    },

    SampledTrace {
        spec: SampledTraceSpec,
        location: SourceLocation,
    },

    If {
        branches: Vec<LalExtractorBranch>,
        else_steps: Vec<ExtractorStep>,
        location: SourceLocation,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LalExtractorBranch {
    condition: ClosureExpression,
    steps: Vec<ExtractorStep>,
}

impl LalExtractorBranch {
    pub fn new(condition: ClosureExpression, steps: Vec<ExtractorStep>) -> LalExtractorBranch {
        Self { condition, steps }
    }

    pub fn get_condition(&self) -> &ClosureExpression {
        &self.condition
    }

    pub fn get_steps(&self) -> &[ExtractorStep] {
        &self.steps
    }
}

/// `metric { name …; timestamp …; labels k: v, …; value … }`
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    pub name: ClosureExpression,
    pub timestamp: Option<ClosureExpression>,
    pub labels: Vec<(Box<str>, ClosureExpression)>,
    pub value: ClosureExpression,
}

/// `sampledTrace { latency …; uri …; reason … }`: every field optional,
/// at least one required.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampledTraceSpec {
    pub latency: Option<ClosureExpression>,
    pub uri: Option<ClosureExpression>,
    pub reason: Option<ClosureExpression>,
}

impl SampledTraceSpec {
    pub fn is_empty(&self) -> bool {
        self.latency.is_none() && self.uri.is_none() && self.reason.is_none()
    }
}

/// `sampler { rateLimit("…") { rpm N } }`
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSpec {
    pub rate_limit_key: GString,
    pub rpm: u32,
}

/// A string with embedded `${expr}` references, evaluated per record to form
/// the rate-limit key.
#[derive(Debug, Clone, PartialEq)]
pub struct GString {
    parts: Vec<GStringPart>,
}

impl GString {
    pub fn new(parts: Vec<GStringPart>) -> GString {
        Self { parts }
    }

    pub fn get_parts(&self) -> &[GStringPart] {
        &self.parts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GStringPart {
    Literal(Box<str>),
    Expression(ClosureExpression),
}

/// One `{ name, dsl }` entry of a LAL rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LalRuleEntry {
    pub name: String,
    pub dsl: String,
}

impl LalRuleEntry {
    /// The canonical DSL body: surrounding whitespace stripped. Its SHA-256
    /// is the stable artifact identifier.
    pub fn canonical_dsl(&self) -> &str {
        self.dsl.trim()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LalRules {
    pub rules: Vec<LalRuleEntry>,
}
