// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod catalog;
pub(crate) mod closure_exec;
pub(crate) mod counter_window;
pub(crate) mod error;
pub(crate) mod family;
pub(crate) mod lal_exec;
pub(crate) mod loader;
pub(crate) mod mal_exec;
pub(crate) mod oal_exec;
pub(crate) mod pipeline;
pub(crate) mod sample;
pub(crate) mod scope_registry;
pub(crate) mod services;
pub(crate) mod value;

pub use catalog::ArtifactCatalog;
pub use closure_exec::CompiledClosure;
pub use counter_window::{CounterWindow, WindowObservation, global_counter_window};
pub use error::Error;
pub use lal_exec::{CompiledScript, LogBinding, LogRecord, SampledTraceRecord};
pub use loader::{AnalysisRuntime, Distribution, LoadError};
pub use mal_exec::{CompiledExpression, CompiledFilter, EvalOptions, SampleMap};
pub use oal_exec::{CompiledDispatcher, CompiledMetric, DerivedMetric, MetricsSink, Source};
pub use pipeline::{LogPipeline, LogProcessResult, MeterPipeline, MeterSink};
pub use sample::{FamilyContext, Labels, Sample, SampleFamily};
pub use scope_registry::{DisabledSources, RegistryError, ScopeEntry, ScopeRegistry};
pub use services::{
    DefaultProcessRegistry, K8sMetadataRegistry, ProcessRegistry, RuntimeServices,
};
pub use value::Value;
