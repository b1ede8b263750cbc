// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use analysis_engine_parser_abstractions::ParseError;

/// Build-time failure. Any of these aborts the build: a rule is either
/// present and correct in the emitted artifacts, or the build fails.
#[derive(Error, Debug)]
pub enum TranspileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{file}: failed to read rule file: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: invalid rule file: {source}")]
    Yaml {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{file}: '{name}' is not a sample family operation")]
    UnknownFunction { file: String, name: String },

    #[error("{file}: '{metric}' has no terminal scope operation")]
    MissingScope { file: String, metric: String },

    #[error("{file}: '{metric}' binds more than one scope")]
    MultipleScopes { file: String, metric: String },

    #[error("{file}: '{metric}' applies '{op}' after its scope binding")]
    OperationAfterScope {
        file: String,
        metric: String,
        op: String,
    },

    #[error("{file}: '{op}' argument {index} is invalid: {reason}")]
    BadArgument {
        file: String,
        op: String,
        index: usize,
        reason: String,
    },

    #[error("{file}: metric '{metric}' is defined more than once")]
    DuplicateMetricName { file: String, metric: String },

    #[error("{file}: '{source_name}' is not a known source")]
    UnknownSource { file: String, source_name: String },

    #[error("{file}: '{field}' is not a field of source '{source_name}'")]
    UnknownSourceField {
        file: String,
        source_name: String,
        field: String,
    },

    #[error("{file}: '{name}' is not an OAL aggregation function")]
    UnknownOalFunction { file: String, name: String },

    #[error("{file}: invalid regular expression '{pattern}': {source}")]
    InvalidRegex {
        file: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
