// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{LalRules, MetricRules};

pub const OAL_METRICS_CLASSES: &str = "oal-metrics-classes.txt";
pub const OAL_DISPATCHER_CLASSES: &str = "oal-dispatcher-classes.txt";
pub const OAL_DISABLED_SOURCES: &str = "oal-disabled-sources.txt";
pub const SCOPE_DECLARATION_SCAN: &str = "annotation-scan/ScopeDeclaration.txt";
pub const METER_FUNCTION_SCAN: &str = "annotation-scan/MeterFunction.txt";
pub const MAL_METER_CLASSES: &str = "mal-meter-classes.txt";
pub const MAL_EXPRESSION_HASHES: &str = "mal-groovy-expression-hashes.txt";
pub const MAL_EXPRESSIONS: &str = "mal-expressions.txt";
pub const MAL_FILTER_EXPRESSIONS: &str = "mal-filter-expressions.properties";
pub const LAL_SCRIPTS: &str = "lal-scripts.txt";
pub const LAL_EXPRESSIONS: &str = "lal-expressions.txt";
pub const CONFIG_DATA_DIR: &str = "config-data";
pub const GENERATED_SRC_DIR: &str = "generated";

/// `snake_or_kebab` to `CamelCase`, for class-style FQN segments.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;

    for c in name.chars() {
        if c == '_' || c == '-' || c == '.' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    out
}

pub fn oal_metric_fqn(metric_name: &str) -> String {
    format!("oal.rt.metrics.{}", camel_case(metric_name))
}

pub fn oal_dispatcher_fqn(source_name: &str) -> String {
    format!("oal.rt.dispatcher.{source_name}Dispatcher")
}

pub fn oal_function_fqn(function_name: &str) -> String {
    format!("oal.rt.function.{}Function", camel_case(function_name))
}

pub fn mal_meter_fqn(metric_name: &str) -> String {
    format!("mal.rt.meter.{metric_name}")
}

pub fn mal_expression_fqn(metric_name: &str) -> String {
    format!("mal.rt.expression.MalExpr_{metric_name}")
}

pub fn mal_filter_fqn(index: usize) -> String {
    format!("mal.rt.filter.MalFilter_{index}")
}

pub fn lal_expression_fqn(index: usize) -> String {
    format!("lal.rt.LalExpr_{index}")
}

/// Which rule-file dialect a meter group was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDialect {
    Standard,
    Zabbix,
    Telegraf,
}

/// Rule data serialized to `config-data/<group>.json` for one MAL rule
/// group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterGroupData {
    pub group: String,
    pub dialect: RuleDialect,
    pub rules: MetricRules,
    /// Composed (and suffixed, where applicable) metric names in load order.
    pub metric_names: Vec<String>,
}

/// Rule data serialized to `config-data/<group>.json` for one LAL rule
/// group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogGroupData {
    pub group: String,
    pub rules: LalRules,
    /// Canonical DSL hashes in rule order.
    pub dsl_hashes: Vec<String>,
}

/// Deterministic JSON rendering used for every `config-data` file: two-space
/// indentation and lexicographically sorted object keys, independent of
/// struct field order. Same value in, same bytes out.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let tree = serde_json::to_value(value)?;
    let mut out = serde_json::to_string_pretty(&tree)?;
    out.push('\n');
    Ok(out)
}

pub fn from_canonical_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::MetricRuleEntry;

    fn group_data() -> MeterGroupData {
        MeterGroupData {
            group: "meter-vm".into(),
            dialect: RuleDialect::Standard,
            rules: MetricRules {
                metric_prefix: "meter_vm".into(),
                exp_prefix: Some("tag({tags -> tags.host = 'h' })".into()),
                exp_suffix: None,
                filter: None,
                init_exp: None,
                metrics_rules: vec![MetricRuleEntry {
                    name: "cpu".into(),
                    exp: "cpu_total.sum(['host']).service(['host'], Layer.GENERAL)".into(),
                }],
            },
            metric_names: vec!["meter_vm_cpu".into()],
        }
    }

    #[test]
    fn test_canonical_json_round_trips_to_identical_bytes() {
        let first = to_canonical_json(&group_data()).unwrap();
        let reloaded: MeterGroupData = from_canonical_json(&first).unwrap();
        let second = to_canonical_json(&reloaded).unwrap();

        assert_eq!(first, second);
        assert_eq!(group_data(), reloaded);
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let text = to_canonical_json(&group_data()).unwrap();
        let dialect = text.find("\"dialect\"").unwrap();
        let group = text.find("\"group\"").unwrap();
        let metric_names = text.find("\"metricNames\"").unwrap();
        let rules = text.find("\"rules\"").unwrap();

        assert!(dialect < group && group < metric_names && metric_names < rules);
    }
}
