// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

// Each integration binary uses a different slice of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;

use analysis_engine_runtime::{Labels, Sample, SampleFamily, SampleMap};

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn family_at(name: &str, entries: &[(&[(&str, &str)], f64)], timestamp: i64) -> SampleFamily {
    SampleFamily::build(
        entries
            .iter()
            .map(|(pairs, value)| Sample::new(name, labels(pairs), *value, timestamp))
            .collect(),
    )
}

pub fn family(name: &str, entries: &[(&[(&str, &str)], f64)]) -> SampleFamily {
    family_at(name, entries, 1_000)
}

pub fn sample_map(families: Vec<SampleFamily>) -> SampleMap {
    let mut map = HashMap::new();
    for family in families {
        let name = family
            .get_name()
            .expect("test families are never empty")
            .to_string();
        map.insert(name, family);
    }
    map
}

/// Compare two families: identical label mappings, identical scope binding,
/// values within the given tolerance.
pub fn assert_family_eq(expected: &SampleFamily, actual: &SampleFamily, tolerance: f64) {
    assert_eq!(
        expected.get_scope(),
        actual.get_scope(),
        "scope bindings differ"
    );
    assert_eq!(
        expected.get_samples().len(),
        actual.get_samples().len(),
        "sample counts differ: expected {expected:?}, actual {actual:?}"
    );

    for sample in expected.get_samples() {
        let matching = actual
            .get_samples()
            .iter()
            .find(|s| s.get_labels() == sample.get_labels())
            .unwrap_or_else(|| {
                panic!("no sample with labels {:?} in {actual:?}", sample.get_labels())
            });

        let delta = (sample.get_value() - matching.get_value()).abs();
        assert!(
            delta <= tolerance || (sample.get_value().is_nan() && matching.get_value().is_nan()),
            "value mismatch for {:?}: expected {}, actual {}",
            sample.get_labels(),
            sample.get_value(),
            matching.get_value()
        );
    }
}
