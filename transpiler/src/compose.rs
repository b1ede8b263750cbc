// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use sha2::{Digest, Sha256};

use analysis_engine_model::MetricRules;

/// Apply `expPrefix`/`expSuffix` composition to one rule expression:
///
/// 1. with a prefix, the head `sample.tail` becomes `(sample.prefix).tail`;
/// 2. with a suffix, the whole expression is wrapped as `(…).suffix`.
///
/// Composition is textual; the composed string is what is parsed, hashed,
/// and recorded in the expression-hashes manifest.
pub fn compose_expression(rules: &MetricRules, exp: &str) -> String {
    let exp = exp.trim();

    let composed = match rules.exp_prefix.as_deref().map(str::trim) {
        Some(prefix) if !prefix.is_empty() => match exp.split_once('.') {
            Some((head, tail)) => format!("({head}.{prefix}).{tail}"),
            None => format!("({exp}.{prefix})"),
        },
        _ => exp.to_string(),
    };

    match rules.exp_suffix.as_deref().map(str::trim) {
        Some(suffix) if !suffix.is_empty() => format!("({composed}).{suffix}"),
        _ => composed,
    }
}

/// Lowercase hex SHA-256 of an expression or DSL body.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn rules(prefix: Option<&str>, suffix: Option<&str>) -> MetricRules {
        MetricRules {
            metric_prefix: "meter".into(),
            exp_prefix: prefix.map(String::from),
            exp_suffix: suffix.map(String::from),
            filter: None,
            init_exp: None,
            metrics_rules: vec![],
        }
    }

    #[test]
    fn test_prefix_rewrites_the_head() {
        let composed = compose_expression(
            &rules(Some("tagEqual('job', 'vm')"), None),
            "cpu_total.sum(['host']).service(['host'], Layer.GENERAL)",
        );

        assert_eq!(
            "(cpu_total.tagEqual('job', 'vm')).sum(['host']).service(['host'], Layer.GENERAL)",
            composed
        );
    }

    #[test]
    fn test_suffix_wraps_the_whole_expression() {
        let composed = compose_expression(
            &rules(None, Some("service(['host'], Layer.GENERAL)")),
            "cpu_total.sum(['host'])",
        );

        assert_eq!(
            "(cpu_total.sum(['host'])).service(['host'], Layer.GENERAL)",
            composed
        );
    }

    #[test]
    fn test_prefix_and_suffix_compose() {
        let composed = compose_expression(
            &rules(Some("rate('PT1M')"), Some("downsampling(SUM)")),
            "reqs.sum(['svc']).service(['svc'], Layer.HTTP)",
        );

        assert_eq!(
            "((reqs.rate('PT1M')).sum(['svc']).service(['svc'], Layer.HTTP)).downsampling(SUM)",
            composed
        );
    }

    #[test]
    fn test_headless_expression_with_prefix() {
        let composed = compose_expression(&rules(Some("sum(['x'])"), None), "cpu");

        assert_eq!("(cpu.sum(['x']))", composed);
    }

    #[test]
    fn test_identical_text_hashes_identically() {
        assert_eq!(sha256_hex("a.sum(['x'])"), sha256_hex("a.sum(['x'])"));
        assert_ne!(sha256_hex("a.sum(['x'])"), sha256_hex("a.sum(['y'])"));
    }
}
