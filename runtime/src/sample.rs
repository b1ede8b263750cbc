// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use analysis_engine_model::{DownsamplingType, ScopeBinding};

/// Label mapping of one sample. Ordered so that two samples with the same
/// labels always produce the same key, join, and group results.
pub type Labels = BTreeMap<String, String>;

/// One observation. Immutable after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    name: Box<str>,
    labels: Labels,
    value: f64,
    /// Epoch milliseconds.
    timestamp: i64,
}

impl Sample {
    pub fn new(name: &str, labels: Labels, value: f64, timestamp: i64) -> Sample {
        Self {
            name: name.into(),
            labels,
            value,
            timestamp,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_labels(&self) -> &Labels {
        &self.labels
    }

    pub fn get_value(&self) -> f64 {
        self.value
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    /// A copy of this sample with different labels.
    pub fn with_labels(&self, labels: Labels) -> Sample {
        Self {
            name: self.name.clone(),
            labels,
            value: self.value,
            timestamp: self.timestamp,
        }
    }

    /// A copy of this sample with a different value.
    pub fn with_value(&self, value: f64) -> Sample {
        Self {
            name: self.name.clone(),
            labels: self.labels.clone(),
            value,
            timestamp: self.timestamp,
        }
    }
}

/// Execution facts a family accumulates as operations are applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FamilyContext {
    pub scope: Option<ScopeBinding>,
    pub downsampling: Option<DownsamplingType>,
    pub histogram: bool,
}

/// A non-empty ordered sequence of samples sharing one metric name, plus the
/// distinguished `EMPTY` sentinel (a family with no samples). Families are
/// immutable: every operation returns a new family.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFamily {
    samples: Vec<Sample>,
    context: FamilyContext,
}

impl SampleFamily {
    /// The `EMPTY` sentinel.
    pub fn empty() -> SampleFamily {
        Self {
            samples: Vec::new(),
            context: FamilyContext::default(),
        }
    }

    /// Build a family from samples. Later samples replace earlier ones with
    /// the same label mapping, so the no-duplicate-labels invariant holds by
    /// construction.
    pub fn build(samples: Vec<Sample>) -> SampleFamily {
        let mut deduped: Vec<Sample> = Vec::with_capacity(samples.len());

        for sample in samples {
            debug_assert!(
                deduped.is_empty() || deduped[0].get_name() == sample.get_name(),
                "samples in one family share a metric name"
            );

            if let Some(existing) = deduped
                .iter_mut()
                .find(|s| s.get_labels() == sample.get_labels())
            {
                *existing = sample;
            } else {
                deduped.push(sample);
            }
        }

        Self {
            samples: deduped,
            context: FamilyContext::default(),
        }
    }

    pub(crate) fn with_context(samples: Vec<Sample>, context: FamilyContext) -> SampleFamily {
        if samples.is_empty() {
            return Self::empty();
        }

        let mut family = Self::build(samples);
        family.context = context;
        family
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get_samples(&self) -> &[Sample] {
        &self.samples
    }

    /// The shared metric name, `None` for `EMPTY`.
    pub fn get_name(&self) -> Option<&str> {
        self.samples.first().map(|s| s.get_name())
    }

    pub fn get_context(&self) -> &FamilyContext {
        &self.context
    }

    pub(crate) fn get_context_mut(&mut self) -> &mut FamilyContext {
        &mut self.context
    }

    pub fn get_scope(&self) -> Option<&ScopeBinding> {
        self.context.scope.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub fn family(name: &str, entries: &[(&[(&str, &str)], f64)]) -> SampleFamily {
        family_at(name, entries, 1_000)
    }

    pub fn family_at(
        name: &str,
        entries: &[(&[(&str, &str)], f64)],
        timestamp: i64,
    ) -> SampleFamily {
        SampleFamily::build(
            entries
                .iter()
                .map(|(label_pairs, value)| {
                    Sample::new(name, labels(label_pairs), *value, timestamp)
                })
                .collect(),
        )
    }
}
