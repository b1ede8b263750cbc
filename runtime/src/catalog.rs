// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use analysis_engine_model::{DispatcherProgram, FilterProgram, LalProgram, MalProgram, MetricProgram};

/// Compiled-artifact index keyed by FQN. Generated registration code
/// installs every artifact here at startup; the loader resolves manifest
/// entries against it and fails on anything missing.
#[derive(Default)]
pub struct ArtifactCatalog {
    mal_expressions: BTreeMap<String, Arc<MalProgram>>,
    mal_filters: BTreeMap<String, Arc<FilterProgram>>,
    lal_scripts: BTreeMap<String, Arc<LalProgram>>,
    oal_metrics: BTreeMap<String, Arc<MetricProgram>>,
    oal_dispatchers: BTreeMap<String, Arc<DispatcherProgram>>,
}

impl ArtifactCatalog {
    pub fn new() -> ArtifactCatalog {
        Self::default()
    }

    pub fn install_mal_expression(&mut self, fqn: &str, program: MalProgram) {
        self.mal_expressions.insert(fqn.into(), Arc::new(program));
    }

    pub fn install_mal_filter(&mut self, fqn: &str, program: FilterProgram) {
        self.mal_filters.insert(fqn.into(), Arc::new(program));
    }

    pub fn install_lal_script(&mut self, fqn: &str, program: LalProgram) {
        self.lal_scripts.insert(fqn.into(), Arc::new(program));
    }

    pub fn install_oal_metric(&mut self, fqn: &str, program: MetricProgram) {
        self.oal_metrics.insert(fqn.into(), Arc::new(program));
    }

    pub fn install_oal_dispatcher(&mut self, fqn: &str, program: DispatcherProgram) {
        self.oal_dispatchers.insert(fqn.into(), Arc::new(program));
    }

    pub fn mal_expression(&self, fqn: &str) -> Option<Arc<MalProgram>> {
        self.mal_expressions.get(fqn).cloned()
    }

    pub fn mal_filter(&self, fqn: &str) -> Option<Arc<FilterProgram>> {
        self.mal_filters.get(fqn).cloned()
    }

    pub fn lal_script(&self, fqn: &str) -> Option<Arc<LalProgram>> {
        self.lal_scripts.get(fqn).cloned()
    }

    pub fn oal_metric(&self, fqn: &str) -> Option<Arc<MetricProgram>> {
        self.oal_metrics.get(fqn).cloned()
    }

    pub fn oal_dispatcher(&self, fqn: &str) -> Option<Arc<DispatcherProgram>> {
        self.oal_dispatchers.get(fqn).cloned()
    }

    /// The process-wide catalog generated registration code installs into.
    pub fn global() -> &'static RwLock<ArtifactCatalog> {
        static CATALOG: Lazy<RwLock<ArtifactCatalog>> =
            Lazy::new(|| RwLock::new(ArtifactCatalog::new()));
        &CATALOG
    }
}
