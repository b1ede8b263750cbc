// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::Path;

use analysis_engine_model::{
    CONFIG_DATA_DIR, FilterProgram, GENERATED_SRC_DIR, LAL_EXPRESSIONS, LAL_SCRIPTS,
    LalProgram, LogGroupData, MAL_EXPRESSION_HASHES, MAL_EXPRESSIONS,
    MAL_FILTER_EXPRESSIONS, MAL_METER_CLASSES, METER_FUNCTION_SCAN, MalProgram, MeterGroupData,
    OAL_DISABLED_SOURCES, OAL_DISPATCHER_CLASSES, OAL_METRICS_CLASSES,
    OalFunction, RuleDialect, SCOPE_DECLARATION_SCAN, all_sources, lal_expression_fqn,
    mal_expression_fqn, mal_filter_fqn, mal_meter_fqn, oal_function_fqn, to_canonical_json,
};

use crate::codegen::writer::CodeWriter;
use crate::codegen::{
    GENERATED_HEADER, render_lal_script, render_mal_expression, render_mal_filter,
    render_oal_dispatcher, render_oal_metric,
};
use crate::compose::compose_expression;
use crate::lal_transpiler::transpile_lal_script;
use crate::mal_transpiler::{transpile_expression, transpile_filter_literal};
use crate::manifest_writer::ManifestSet;
use crate::oal_emitter::{OalEmission, OalEmitter};
use crate::rules::{load_lal_rules, load_metric_rules};
use crate::TranspileError;

struct MeterGroupBuild {
    data: MeterGroupData,
}

struct LogGroupBuild {
    data: LogGroupData,
    rule_fqns: Vec<(String, String)>,
}

/// Everything one build produced: the manifest set (including rendered
/// artifact sources) plus the compiled programs for direct installation
/// into an artifact catalog.
pub struct DistributionOutput {
    pub manifests: ManifestSet,
    pub oal: OalEmission,
    pub mal_programs: Vec<MalProgram>,
    pub filter_programs: Vec<FilterProgram>,
    pub lal_programs: Vec<LalProgram>,
    pub meter_groups: Vec<MeterGroupData>,
    pub log_groups: Vec<LogGroupData>,
}

impl DistributionOutput {
    pub fn write_to(&self, root: &Path) -> Result<(), TranspileError> {
        self.manifests.write_to(root)
    }
}

/// Build-time orchestrator: feed it rule files, then `build()` the packaged
/// distribution. Per-file processing is independent; every output
/// collection is sorted after the fact, so feeding order only matters where
/// the contract says it does (OAL define order, duplicate-name suffixes).
pub struct DistributionBuilder {
    oal: OalEmitter,
    meter_groups: Vec<MeterGroupBuild>,
    mal_programs: Vec<MalProgram>,
    used_metric_names: BTreeMap<String, usize>,
    filter_indices: BTreeMap<String, usize>,
    filter_programs: Vec<FilterProgram>,
    log_groups: Vec<LogGroupBuild>,
    lal_indices: BTreeMap<String, usize>,
    lal_programs: Vec<LalProgram>,
}

impl DistributionBuilder {
    pub fn new() -> DistributionBuilder {
        Self {
            oal: OalEmitter::new(),
            meter_groups: Vec::new(),
            mal_programs: Vec::new(),
            used_metric_names: BTreeMap::new(),
            filter_indices: BTreeMap::new(),
            filter_programs: Vec::new(),
            log_groups: Vec::new(),
            lal_indices: BTreeMap::new(),
            lal_programs: Vec::new(),
        }
    }

    /// Feed one OAL script file, in the order of the static define table.
    pub fn add_oal_file(&mut self, file: &str, script: &str) -> Result<(), TranspileError> {
        self.oal.emit_file(file, script)
    }

    /// Feed one MAL rule file (any dialect).
    pub fn add_meter_group(
        &mut self,
        group: &str,
        file: &str,
        text: &str,
        dialect: RuleDialect,
    ) -> Result<(), TranspileError> {
        let rules = load_metric_rules(file, text, dialect)?;

        let mut metric_names = Vec::with_capacity(rules.metrics_rules.len());
        for entry in &rules.metrics_rules {
            let composed = compose_expression(&rules, &entry.exp);
            let metric_name = self.assign_metric_name(rules.compose_metric_name(&entry.name));
            self.mal_programs
                .push(transpile_expression(file, &metric_name, &composed, false)?);
            metric_names.push(metric_name);
        }

        if let Some(literal) = rules.filter.as_deref()
            && !self.filter_indices.contains_key(literal)
        {
            let program = transpile_filter_literal(file, literal)?;
            self.filter_indices
                .insert(literal.to_string(), self.filter_programs.len());
            self.filter_programs.push(program);
        }

        if let Some(init_exp) = rules.init_exp.as_deref() {
            let init_name =
                self.assign_metric_name(format!("{}__init", rules.metric_prefix));
            self.mal_programs
                .push(transpile_expression(file, &init_name, init_exp.trim(), true)?);
        }

        self.meter_groups.push(MeterGroupBuild {
            data: MeterGroupData {
                group: group.to_string(),
                dialect,
                rules,
                metric_names,
            },
        });

        Ok(())
    }

    /// Feed one LAL rule file.
    pub fn add_log_group(
        &mut self,
        group: &str,
        file: &str,
        text: &str,
    ) -> Result<(), TranspileError> {
        let rules = load_lal_rules(file, text)?;

        let mut dsl_hashes = Vec::with_capacity(rules.rules.len());
        let mut rule_fqns = Vec::with_capacity(rules.rules.len());

        for rule in &rules.rules {
            let program = transpile_lal_script(file, &rule.dsl)?;
            let hash = program.dsl_hash.clone();

            let index = match self.lal_indices.get(&hash) {
                Some(index) => *index,
                None => {
                    let index = self.lal_programs.len();
                    self.lal_indices.insert(hash.clone(), index);
                    self.lal_programs.push(program);
                    index
                }
            };

            rule_fqns.push((rule.name.clone(), lal_expression_fqn(index)));
            dsl_hashes.push(hash);
        }

        self.log_groups.push(LogGroupBuild {
            data: LogGroupData {
                group: group.to_string(),
                rules,
                dsl_hashes,
            },
            rule_fqns,
        });

        Ok(())
    }

    /// Duplicate metric names across the corpus receive `_1`, `_2`, …
    /// suffixes in load order.
    fn assign_metric_name(&mut self, name: String) -> String {
        match self.used_metric_names.get_mut(&name) {
            None => {
                self.used_metric_names.insert(name.clone(), 0);
                name
            }
            Some(count) => {
                *count += 1;
                format!("{name}_{count}")
            }
        }
    }

    pub fn build(self) -> Result<DistributionOutput, TranspileError> {
        let oal = self.oal.finish();
        let mut manifests = ManifestSet::new();

        manifests.put_lines(
            OAL_METRICS_CLASSES,
            oal.metrics.iter().map(|m| m.fqn.clone()).collect(),
        );
        manifests.put_lines(
            OAL_DISPATCHER_CLASSES,
            oal.dispatchers.iter().map(|d| d.fqn.clone()).collect(),
        );
        manifests.put_lines(
            OAL_DISABLED_SOURCES,
            oal.disabled_sources.iter().map(|s| s.to_string()).collect(),
        );

        manifests.put_lines(
            SCOPE_DECLARATION_SCAN,
            all_sources().iter().map(|s| s.fqn.to_string()).collect(),
        );
        manifests.put_key_values(
            METER_FUNCTION_SCAN,
            OalFunction::all()
                .iter()
                .map(|f| (f.get_name().to_string(), oal_function_fqn(f.get_name())))
                .collect(),
        );

        let metric_programs: Vec<&MalProgram> =
            self.mal_programs.iter().filter(|p| !p.init).collect();

        manifests.put_key_values(
            MAL_METER_CLASSES,
            metric_programs
                .iter()
                .map(|p| (p.metric_name.clone(), mal_meter_fqn(&p.metric_name)))
                .collect(),
        );
        manifests.put_key_values(
            MAL_EXPRESSION_HASHES,
            metric_programs
                .iter()
                .map(|p| (p.metric_name.clone(), p.expression_hash.clone()))
                .collect(),
        );
        manifests.put_lines(
            MAL_EXPRESSIONS,
            self.mal_programs
                .iter()
                .map(|p| mal_expression_fqn(&p.metric_name))
                .collect(),
        );

        let mut filter_entries = Vec::with_capacity(self.filter_indices.len());
        for (literal, index) in &self.filter_indices {
            filter_entries.push((literal.clone(), mal_filter_fqn(*index)));
        }
        manifests.put_properties(MAL_FILTER_EXPRESSIONS, filter_entries);

        manifests.put_key_values(
            LAL_SCRIPTS,
            self.log_groups
                .iter()
                .flat_map(|g| g.rule_fqns.iter().cloned())
                .collect(),
        );
        manifests.put_key_values(
            LAL_EXPRESSIONS,
            self.lal_indices
                .iter()
                .map(|(hash, index)| (hash.clone(), lal_expression_fqn(*index)))
                .collect(),
        );

        for group in &self.meter_groups {
            let path = format!("{CONFIG_DATA_DIR}/meter/{}.json", group.data.group);
            let json = to_canonical_json(&group.data).map_err(|source| {
                TranspileError::Serialize {
                    path: path.clone(),
                    source,
                }
            })?;
            manifests.put_raw(&path, json);
        }
        for group in &self.log_groups {
            let path = format!("{CONFIG_DATA_DIR}/log/{}.json", group.data.group);
            let json = to_canonical_json(&group.data).map_err(|source| {
                TranspileError::Serialize {
                    path: path.clone(),
                    source,
                }
            })?;
            manifests.put_raw(&path, json);
        }

        let mut modules: Vec<String> = Vec::new();
        for program in &self.mal_programs {
            let module = sanitize_module_name(&format!("mal_expr_{}", program.metric_name));
            manifests.put_raw(
                &format!("{GENERATED_SRC_DIR}/{module}.rs"),
                render_mal_expression(program),
            );
            modules.push(module);
        }
        for index in self.filter_indices.values() {
            let module = format!("mal_filter_{index}");
            manifests.put_raw(
                &format!("{GENERATED_SRC_DIR}/{module}.rs"),
                render_mal_filter(&self.filter_programs[*index], *index),
            );
            modules.push(module);
        }
        for (index, program) in self.lal_programs.iter().enumerate() {
            let module = format!("lal_expr_{index}");
            manifests.put_raw(
                &format!("{GENERATED_SRC_DIR}/{module}.rs"),
                render_lal_script(program, index),
            );
            modules.push(module);
        }
        for metric in &oal.metrics {
            let module = sanitize_module_name(&format!("oal_metric_{}", metric.metric_name));
            manifests.put_raw(
                &format!("{GENERATED_SRC_DIR}/{module}.rs"),
                render_oal_metric(metric),
            );
            modules.push(module);
        }
        for dispatcher in &oal.dispatchers {
            let module = sanitize_module_name(&format!(
                "oal_dispatcher_{}",
                dispatcher.source_name.to_lowercase()
            ));
            manifests.put_raw(
                &format!("{GENERATED_SRC_DIR}/{module}.rs"),
                render_oal_dispatcher(dispatcher),
            );
            modules.push(module);
        }

        modules.sort();
        modules.dedup();
        manifests.put_raw(
            &format!("{GENERATED_SRC_DIR}/mod.rs"),
            render_registry(&modules),
        );

        Ok(DistributionOutput {
            manifests,
            oal,
            mal_programs: self.mal_programs,
            filter_programs: self.filter_programs,
            lal_programs: self.lal_programs,
            meter_groups: self.meter_groups.into_iter().map(|g| g.data).collect(),
            log_groups: self.log_groups.into_iter().map(|g| g.data).collect(),
        })
    }
}

impl Default for DistributionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize_module_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn render_registry(modules: &[String]) -> String {
    let mut w = CodeWriter::new();

    w.line(GENERATED_HEADER.trim_end());
    w.line("");
    w.line("use analysis_engine_runtime::ArtifactCatalog;");
    w.line("");
    for module in modules {
        w.line(&format!("pub(crate) mod {module};"));
    }
    w.line("");
    w.open("pub fn register_all(catalog: &mut ArtifactCatalog) {");
    for module in modules {
        w.line(&format!("{module}::register(catalog);"));
    }
    w.close("}");

    w.finish()
}
