// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use analysis_engine_model::DownsamplingType;

use crate::sample::{Sample, SampleFamily};
use crate::Labels;

#[derive(Debug, Clone, Copy)]
enum Aggregation {
    Sum,
    Max,
    Min,
    Avg,
}

impl SampleFamily {
    /// Group-by over the given label keys, one sum per group.
    pub fn sum(&self, by: &[&str]) -> SampleFamily {
        self.aggregate(by, Aggregation::Sum)
    }

    pub fn max(&self, by: &[&str]) -> SampleFamily {
        self.aggregate(by, Aggregation::Max)
    }

    pub fn min(&self, by: &[&str]) -> SampleFamily {
        self.aggregate(by, Aggregation::Min)
    }

    pub fn avg(&self, by: &[&str]) -> SampleFamily {
        self.aggregate(by, Aggregation::Avg)
    }

    /// Group-by over every label key. Each group already holds exactly one
    /// sample (families never contain duplicate label mappings), so the
    /// samples pass through with the latest-value downsampling recorded.
    pub fn latest(&self) -> SampleFamily {
        if self.is_empty() {
            return SampleFamily::empty();
        }

        let mut result = self.clone();
        result.get_context_mut().downsampling = Some(DownsamplingType::Latest);
        result
    }

    /// Record how the storage layer should fold this family into buckets.
    pub fn downsampling(&self, downsampling: DownsamplingType) -> SampleFamily {
        if self.is_empty() {
            return SampleFamily::empty();
        }

        let mut result = self.clone();
        result.get_context_mut().downsampling = Some(downsampling);
        result
    }

    fn aggregate(&self, by: &[&str], aggregation: Aggregation) -> SampleFamily {
        if self.is_empty() {
            return SampleFamily::empty();
        }

        struct Group {
            total: f64,
            count: u64,
            extreme: f64,
            timestamp: i64,
        }

        let mut groups: BTreeMap<Labels, Group> = BTreeMap::new();

        for sample in self.get_samples() {
            let key: Labels = sample
                .get_labels()
                .iter()
                .filter(|(k, _)| by.iter().any(|b| *b == k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            let value = sample.get_value();
            groups
                .entry(key)
                .and_modify(|group| {
                    group.total += value;
                    group.count += 1;
                    group.extreme = match aggregation {
                        Aggregation::Max => group.extreme.max(value),
                        _ => group.extreme.min(value),
                    };
                    group.timestamp = group.timestamp.max(sample.get_timestamp());
                })
                .or_insert_with(|| Group {
                    total: value,
                    count: 1,
                    extreme: value,
                    timestamp: sample.get_timestamp(),
                });
        }

        let name = self.get_name().expect("non-empty family has a name");
        let samples = groups
            .into_iter()
            .map(|(labels, group)| {
                let value = match aggregation {
                    Aggregation::Sum => group.total,
                    Aggregation::Avg => group.total / group.count as f64,
                    Aggregation::Max | Aggregation::Min => group.extreme,
                };
                Sample::new(name, labels, value, group.timestamp)
            })
            .collect();

        SampleFamily::with_context(samples, self.get_context().clone())
    }
}
