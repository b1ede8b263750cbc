// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use thiserror::Error;

use analysis_engine_model::{
    LAL_EXPRESSIONS, LAL_SCRIPTS, MAL_EXPRESSION_HASHES, MAL_EXPRESSIONS, MAL_FILTER_EXPRESSIONS,
    MAL_METER_CLASSES, MetricProgram, OAL_DISABLED_SOURCES, OAL_DISPATCHER_CLASSES,
    OAL_METRICS_CLASSES, SCOPE_DECLARATION_SCAN, source_by_fqn,
};

use crate::catalog::ArtifactCatalog;
use crate::lal_exec::CompiledScript;
use crate::mal_exec::{CompiledExpression, CompiledFilter};
use crate::oal_exec::{CompiledDispatcher, CompiledMetric, MetricsSink, Source};
use crate::scope_registry::{DisabledSources, RegistryError, ScopeEntry, ScopeRegistry};
use crate::{Error, RuntimeServices};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line '{line}' in {file} is not of the form {expected}")]
    MalformedLine {
        file: String,
        line: String,
        expected: &'static str,
    },

    #[error("'{0}' does not resolve to a known scope declaration")]
    UnresolvedScope(String),

    #[error("'{0}' is not present in the artifact catalog")]
    UnresolvedArtifact(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("'{0}' is not a registered metric")]
    UnknownMetric(String),

    #[error("no compiled script is registered for DSL hash {0}")]
    UnknownScript(String),

    #[error("'{literal}' is not a known filter literal; known literals: {known:?}")]
    UnknownFilterLiteral { literal: String, known: Vec<String> },

    #[error("artifact failed to instantiate: {0}")]
    Instantiation(#[from] Error),
}

/// One packaged distribution on disk: the manifest files the build wrote.
pub struct Distribution {
    root: PathBuf,
}

impl Distribution {
    pub fn open(root: impl Into<PathBuf>) -> Distribution {
        Self { root: root.into() }
    }

    fn read_text(&self, name: &str) -> Result<String, LoadError> {
        let path = self.root.join(name);
        std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Line-oriented manifest: UTF-8, LF-terminated, blank lines ignored.
    pub fn read_lines(&self, name: &str) -> Result<Vec<String>, LoadError> {
        Ok(self
            .read_text(name)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.to_string())
            .collect())
    }

    /// `key=value` manifest: the first `=` splits key and value; values may
    /// contain `=`.
    pub fn read_key_values(&self, name: &str) -> Result<Vec<(String, String)>, LoadError> {
        self.read_lines(name)?
            .into_iter()
            .map(|line| {
                line.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| LoadError::MalformedLine {
                        file: name.to_string(),
                        line,
                        expected: "key=value",
                    })
            })
            .collect()
    }

    /// Properties file: like `key=value`, with backslash escapes in keys.
    pub fn read_properties(&self, name: &str) -> Result<Vec<(String, String)>, LoadError> {
        self.read_lines(name)?
            .into_iter()
            .map(|line| {
                split_property_line(&line).ok_or_else(|| LoadError::MalformedLine {
                    file: name.to_string(),
                    line,
                    expected: "escaped-key=value",
                })
            })
            .collect()
    }
}

fn split_property_line(line: &str) -> Option<(String, String)> {
    let mut key = String::new();
    let mut chars = line.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => key.push('\n'),
                Some((_, 't')) => key.push('\t'),
                Some((_, escaped)) => key.push(escaped),
                None => return None,
            },
            '=' | ':' => return Some((key, line[i + 1..].to_string())),
            _ => key.push(c),
        }
    }

    None
}

pub(crate) fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// The started analysis core: manifest-resolved artifact indices plus the
/// lazy instantiation caches. Everything behind the caches is write-once.
#[derive(Debug)]
pub struct AnalysisRuntime {
    services: RuntimeServices,

    dispatchers: BTreeMap<String, CompiledDispatcher>,
    oal_metrics: BTreeMap<String, Arc<MetricProgram>>,

    mal_expression_fqns: BTreeMap<String, String>,
    mal_programs: BTreeMap<String, Arc<analysis_engine_model::MalProgram>>,
    init_expressions: Vec<Arc<CompiledExpression>>,
    expression_hashes: BTreeMap<String, String>,
    filters: BTreeMap<String, Arc<CompiledFilter>>,

    lal_hash_fqns: BTreeMap<String, String>,
    lal_rule_fqns: BTreeMap<String, String>,
    lal_programs: BTreeMap<String, Arc<analysis_engine_model::LalProgram>>,

    expression_cache: RwLock<HashMap<String, Arc<CompiledExpression>>>,
    script_cache: RwLock<HashMap<String, Arc<CompiledScript>>>,
}

impl AnalysisRuntime {
    /// Start the core from a distribution: initialize the scope registry and
    /// disable set, instantiate every OAL artifact in manifest order, and
    /// index the MAL/LAL artifacts for lazy instantiation. Any missing FQN
    /// aborts startup.
    pub fn bootstrap(
        distribution: &Distribution,
        catalog: &ArtifactCatalog,
        services: RuntimeServices,
    ) -> Result<AnalysisRuntime, LoadError> {
        let mut scope_entries = Vec::new();
        for fqn in distribution.read_lines(SCOPE_DECLARATION_SCAN)? {
            let declaration =
                source_by_fqn(&fqn).map_err(|_| LoadError::UnresolvedScope(fqn.clone()))?;
            scope_entries.push(ScopeEntry {
                id: declaration.id,
                name: declaration.name.into(),
                fields: declaration.fields.iter().map(|f| Box::from(*f)).collect(),
            });
        }
        ScopeRegistry::init(scope_entries)?;

        DisabledSources::init(
            distribution
                .read_lines(OAL_DISABLED_SOURCES)?
                .into_iter()
                .map(Box::from)
                .collect(),
        )?;

        let mut oal_metrics = BTreeMap::new();
        for fqn in distribution.read_lines(OAL_METRICS_CLASSES)? {
            let program = catalog
                .oal_metric(&fqn)
                .ok_or_else(|| LoadError::UnresolvedArtifact(fqn.clone()))?;
            oal_metrics.insert(program.metric_name.clone(), program);
        }

        let mut dispatchers = BTreeMap::new();
        for fqn in distribution.read_lines(OAL_DISPATCHER_CLASSES)? {
            let program = catalog
                .oal_dispatcher(&fqn)
                .ok_or_else(|| LoadError::UnresolvedArtifact(fqn.clone()))?;

            let mut metrics = Vec::with_capacity(program.metrics.len());
            for metric_name in &program.metrics {
                let metric = oal_metrics
                    .get(metric_name)
                    .ok_or_else(|| LoadError::UnknownMetric(metric_name.clone()))?;
                metrics.push(CompiledMetric::new(metric.clone()));
            }

            dispatchers.insert(
                program.source_name.clone(),
                CompiledDispatcher::new(program, metrics),
            );
        }

        let mut mal_expression_fqns = BTreeMap::new();
        let mut mal_programs = BTreeMap::new();
        for (metric_name, _meter_fqn) in distribution.read_key_values(MAL_METER_CLASSES)? {
            let expression_fqn = analysis_engine_model::mal_expression_fqn(&metric_name);
            let program = catalog
                .mal_expression(&expression_fqn)
                .ok_or_else(|| LoadError::UnresolvedArtifact(expression_fqn.clone()))?;
            mal_programs.insert(expression_fqn.clone(), program);
            mal_expression_fqns.insert(metric_name, expression_fqn);
        }

        for fqn in distribution.read_lines(MAL_EXPRESSIONS)? {
            if !mal_programs.contains_key(&fqn) {
                let program = catalog
                    .mal_expression(&fqn)
                    .ok_or_else(|| LoadError::UnresolvedArtifact(fqn.clone()))?;
                mal_programs.insert(fqn, program);
            }
        }

        let mut init_expressions = Vec::new();
        for program in mal_programs.values() {
            if program.init {
                init_expressions.push(Arc::new(CompiledExpression::new(program.clone())?));
            }
        }

        let expression_hashes = distribution
            .read_key_values(MAL_EXPRESSION_HASHES)?
            .into_iter()
            .collect();

        // Filter-literal lookups are strict, so filters instantiate eagerly.
        let mut filters = BTreeMap::new();
        for (literal, fqn) in distribution.read_properties(MAL_FILTER_EXPRESSIONS)? {
            let program = catalog
                .mal_filter(&fqn)
                .ok_or_else(|| LoadError::UnresolvedArtifact(fqn.clone()))?;
            filters.insert(literal, Arc::new(CompiledFilter::new(&program)?));
        }

        let lal_rule_fqns: BTreeMap<String, String> = distribution
            .read_key_values(LAL_SCRIPTS)?
            .into_iter()
            .collect();

        let mut lal_hash_fqns = BTreeMap::new();
        let mut lal_programs = BTreeMap::new();
        for (hash, fqn) in distribution.read_key_values(LAL_EXPRESSIONS)? {
            let program = catalog
                .lal_script(&fqn)
                .ok_or_else(|| LoadError::UnresolvedArtifact(fqn.clone()))?;
            lal_programs.insert(fqn.clone(), program);
            lal_hash_fqns.insert(hash, fqn);
        }

        Ok(Self {
            services,
            dispatchers,
            oal_metrics,
            mal_expression_fqns,
            mal_programs,
            init_expressions,
            expression_hashes,
            filters,
            lal_hash_fqns,
            lal_rule_fqns,
            lal_programs,
            expression_cache: RwLock::new(HashMap::new()),
            script_cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn get_services(&self) -> &RuntimeServices {
        &self.services
    }

    /// Resolve the compiled expression registered under a metric name. The
    /// expression text is kept only for diagnostics; dispatch is by name.
    pub fn parse_metric(
        &self,
        metric_name: &str,
        composed_expression: &str,
    ) -> Result<Arc<CompiledExpression>, LoadError> {
        if let Some(cached) = self.expression_cache.read().get(metric_name) {
            return Ok(cached.clone());
        }

        let fqn = self.mal_expression_fqns.get(metric_name).ok_or_else(|| {
            tracing::debug!(metric_name, composed_expression, "unknown metric requested");
            LoadError::UnknownMetric(metric_name.to_string())
        })?;
        let program = self
            .mal_programs
            .get(fqn)
            .ok_or_else(|| LoadError::UnresolvedArtifact(fqn.clone()))?;

        let compiled = Arc::new(CompiledExpression::new(program.clone())?);
        self.expression_cache
            .write()
            .insert(metric_name.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Resolve the compiled script registered under the SHA-256 of the DSL
    /// text.
    pub fn load_log_script(&self, dsl_text: &str) -> Result<Arc<CompiledScript>, LoadError> {
        let hash = sha256_hex(dsl_text.trim());

        if let Some(cached) = self.script_cache.read().get(&hash) {
            return Ok(cached.clone());
        }

        let fqn = self
            .lal_hash_fqns
            .get(&hash)
            .ok_or_else(|| LoadError::UnknownScript(hash.clone()))?;
        let program = self
            .lal_programs
            .get(fqn)
            .ok_or_else(|| LoadError::UnresolvedArtifact(fqn.clone()))?;

        let compiled = Arc::new(CompiledScript::new(program.clone())?);
        self.script_cache.write().insert(hash, compiled.clone());
        Ok(compiled)
    }

    /// Strict filter-literal lookup: an unknown literal is a configuration
    /// error carrying the full set of known literals.
    pub fn filter_for(&self, literal: &str) -> Result<Arc<CompiledFilter>, LoadError> {
        self.filters
            .get(literal)
            .cloned()
            .ok_or_else(|| LoadError::UnknownFilterLiteral {
                literal: literal.to_string(),
                known: self.filters.keys().cloned().collect(),
            })
    }

    /// Invoke every dispatcher registered for the source's scope.
    pub fn dispatch(&self, source: &Source, sink: &mut dyn MetricsSink) {
        if let Some(dispatcher) = self.dispatchers.get(source.get_scope_name()) {
            dispatcher.dispatch(source, sink);
        }
    }

    pub fn get_dispatcher(&self, source_name: &str) -> Option<&CompiledDispatcher> {
        self.dispatchers.get(source_name)
    }

    pub fn get_metric_names(&self) -> Vec<&str> {
        self.mal_expression_fqns.keys().map(String::as_str).collect()
    }

    pub fn get_expression_hash(&self, metric_name: &str) -> Option<&str> {
        self.expression_hashes.get(metric_name).map(String::as_str)
    }

    /// Init expressions, instantiated at startup and run once by the meter
    /// pipeline.
    pub fn get_init_expressions(&self) -> &[Arc<CompiledExpression>] {
        &self.init_expressions
    }

    pub fn get_lal_rule_names(&self) -> Vec<&str> {
        self.lal_rule_fqns.keys().map(String::as_str).collect()
    }

    pub fn get_oal_metric(&self, metric_name: &str) -> Option<&Arc<MetricProgram>> {
        self.oal_metrics.get(metric_name)
    }
}
