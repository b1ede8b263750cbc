// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;

use analysis_engine_model::{LalRules, MetricRuleEntry, MetricRules, RuleDialect};

use crate::TranspileError;

/// Zabbix rule files use `metrics` where the standard schema says
/// `metricsRules`; everything else is shared.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZabbixRules {
    metric_prefix: String,
    #[serde(default)]
    exp_prefix: Option<String>,
    #[serde(default)]
    exp_suffix: Option<String>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    init_exp: Option<String>,
    metrics: Vec<MetricRuleEntry>,
}

impl From<ZabbixRules> for MetricRules {
    fn from(value: ZabbixRules) -> Self {
        MetricRules {
            metric_prefix: value.metric_prefix,
            exp_prefix: value.exp_prefix,
            exp_suffix: value.exp_suffix,
            filter: value.filter,
            init_exp: value.init_exp,
            metrics_rules: value.metrics,
        }
    }
}

/// Load one MAL rule file. Telegraf files share the standard schema; Zabbix
/// files are mapped into the same model here, not in a separate codegen
/// path.
pub fn load_metric_rules(
    file: &str,
    text: &str,
    dialect: RuleDialect,
) -> Result<MetricRules, TranspileError> {
    let to_error = |source| TranspileError::Yaml {
        file: file.to_string(),
        source,
    };

    match dialect {
        RuleDialect::Standard | RuleDialect::Telegraf => {
            serde_yaml::from_str::<MetricRules>(text).map_err(to_error)
        }
        RuleDialect::Zabbix => serde_yaml::from_str::<ZabbixRules>(text)
            .map(MetricRules::from)
            .map_err(to_error),
    }
}

/// Load one LAL rule file.
pub fn load_lal_rules(file: &str, text: &str) -> Result<LalRules, TranspileError> {
    serde_yaml::from_str::<LalRules>(text).map_err(|source| TranspileError::Yaml {
        file: file.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const STANDARD: &str = r#"
metricPrefix: meter_vm
expSuffix: service(['host'], Layer.GENERAL)
metricsRules:
  - name: cpu_total
    exp: node_cpu_seconds_total.rate('PT1M').sum(['host'])
  - name: memory_used
    exp: node_memory_used_bytes.latest().sum(['host'])
"#;

    const ZABBIX: &str = r#"
metricPrefix: meter_zabbix
filter: "{ tags -> tags.job_name == 'zabbix-fetcher' }"
metrics:
  - name: system_cpu_util
    exp: system_cpu_util.avg(['host']).service(['host'], Layer.OS_LINUX)
"#;

    #[test]
    fn test_standard_dialect() {
        let rules = load_metric_rules("vm.yaml", STANDARD, RuleDialect::Standard).unwrap();

        assert_eq!("meter_vm", rules.metric_prefix);
        assert_eq!(2, rules.metrics_rules.len());
        assert_eq!("cpu_total", rules.metrics_rules[0].name);
        assert_eq!(
            Some("service(['host'], Layer.GENERAL)"),
            rules.exp_suffix.as_deref()
        );
    }

    #[test]
    fn test_zabbix_dialect_maps_metrics_key() {
        let rules = load_metric_rules("zabbix.yaml", ZABBIX, RuleDialect::Zabbix).unwrap();

        assert_eq!("meter_zabbix", rules.metric_prefix);
        assert_eq!(1, rules.metrics_rules.len());
        assert!(rules.filter.is_some());
    }

    #[test]
    fn test_standard_schema_rejects_zabbix_key() {
        assert!(load_metric_rules("zabbix.yaml", ZABBIX, RuleDialect::Standard).is_err());
    }

    #[test]
    fn test_lal_rules() {
        let rules = load_lal_rules(
            "default.yaml",
            "rules:\n  - name: example\n    dsl: |\n      filter {\n        json {}\n      }\n",
        )
        .unwrap();

        assert_eq!(1, rules.rules.len());
        assert_eq!("example", rules.rules[0].name);
        assert!(rules.rules[0].canonical_dsl().starts_with("filter {"));
    }
}
