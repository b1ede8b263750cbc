// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use tracing::warn;

use crate::sample::{Sample, SampleFamily};
use crate::{Error, Labels};

const LE_LABEL: &str = "le";

fn parse_le(value: &str) -> Option<f64> {
    match value {
        "+Inf" | "Inf" | "inf" => Some(f64::INFINITY),
        other => other.parse::<f64>().ok(),
    }
}

struct BucketGroup {
    labels: Labels,
    /// `(upper_bound, cumulative_value, timestamp)` sorted by upper bound.
    buckets: Vec<(f64, f64, i64)>,
}

fn bucket_groups(family: &SampleFamily) -> Vec<BucketGroup> {
    let mut groups: BTreeMap<Labels, Vec<(f64, f64, i64)>> = BTreeMap::new();

    for sample in family.get_samples() {
        let Some(le) = sample.get_labels().get(LE_LABEL).and_then(|v| parse_le(v)) else {
            warn!(
                name = family.get_name().unwrap_or(""),
                "histogram sample without a parseable 'le' label dropped"
            );
            continue;
        };

        let mut labels = sample.get_labels().clone();
        labels.remove(LE_LABEL);
        groups
            .entry(labels)
            .or_default()
            .push((le, sample.get_value(), sample.get_timestamp()));
    }

    groups
        .into_iter()
        .map(|(labels, mut buckets)| {
            buckets.sort_by(|a, b| a.0.total_cmp(&b.0));
            BucketGroup { labels, buckets }
        })
        .collect()
}

impl SampleFamily {
    /// Re-interpret samples with a `le` label as cumulative histogram
    /// buckets. Groups whose cumulative values are not monotonic are dropped
    /// with a warning.
    pub fn histogram(&self) -> SampleFamily {
        if self.is_empty() {
            return SampleFamily::empty();
        }

        let name = self.get_name().expect("non-empty family has a name");
        let mut samples = Vec::new();

        for group in bucket_groups(self) {
            let monotonic = group
                .buckets
                .windows(2)
                .all(|pair| pair[0].1 <= pair[1].1);

            if !monotonic {
                warn!(
                    name,
                    labels = ?group.labels,
                    "histogram group with non-monotonic cumulative values dropped"
                );
                continue;
            }

            for (le, value, timestamp) in &group.buckets {
                let mut labels = group.labels.clone();
                let rendered = if le.is_infinite() {
                    "+Inf".to_string()
                } else {
                    format!("{le}")
                };
                labels.insert(LE_LABEL.to_string(), rendered);
                samples.push(Sample::new(name, labels, *value, *timestamp));
            }
        }

        let mut context = self.get_context().clone();
        context.histogram = true;
        SampleFamily::with_context(samples, context)
    }

    /// One sample per group and percentile, labeled `p=<percentile>`.
    ///
    /// Each bucket's cumulative count is attributed to the bucket's midpoint
    /// (the `+Inf` bucket to its lower bound); percentile ranks are read off
    /// the piecewise-linear curve through those points.
    pub fn histogram_percentile(&self, percentiles: &[i64]) -> Result<SampleFamily, Error> {
        if self.is_empty() {
            return Ok(SampleFamily::empty());
        }

        if !self.get_context().histogram {
            return Err(Error::TypeMismatch(
                "histogram_percentile requires histogram() first".into(),
            ));
        }

        for p in percentiles {
            if !(0..=100).contains(p) {
                return Err(Error::TypeMismatch(format!(
                    "percentile {p} is outside [0, 100]"
                )));
            }
        }

        let name = self.get_name().expect("non-empty family has a name");
        let mut samples = Vec::new();

        for group in bucket_groups(self) {
            let Some(&(_, total, timestamp)) = group.buckets.last() else {
                continue;
            };
            if total <= 0.0 {
                continue;
            }

            // Piecewise-linear curve: rank -> representative value.
            let first_upper = group.buckets[0].0;
            let origin_value = if first_upper.is_finite() && first_upper > 0.0 {
                0.0
            } else if first_upper.is_finite() {
                first_upper
            } else {
                0.0
            };

            let mut points: Vec<(f64, f64)> = vec![(0.0, origin_value)];
            let mut lower = origin_value;
            for (upper, cumulative, _) in &group.buckets {
                let representative = if upper.is_infinite() {
                    lower
                } else {
                    (lower + upper) / 2.0
                };
                if *cumulative > points.last().expect("origin point exists").0 {
                    points.push((*cumulative, representative));
                }
                if upper.is_finite() {
                    lower = *upper;
                }
            }

            for p in percentiles {
                let rank = (*p as f64 / 100.0) * total;

                let mut value = points.last().expect("origin point exists").1;
                for window in points.windows(2) {
                    let (rank_a, value_a) = window[0];
                    let (rank_b, value_b) = window[1];
                    if rank <= rank_b {
                        let span = rank_b - rank_a;
                        let fraction = if span == 0.0 { 0.0 } else { (rank - rank_a) / span };
                        value = value_a + (value_b - value_a) * fraction;
                        break;
                    }
                }

                let mut labels = group.labels.clone();
                labels.insert("p".to_string(), p.to_string());
                samples.push(Sample::new(name, labels, value, timestamp));
            }
        }

        Ok(SampleFamily::with_context(
            samples,
            self.get_context().clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::sample::test_support::*;

    #[test]
    fn test_histogram_marks_family_and_keeps_buckets() {
        let input = family(
            "latency",
            &[
                (&[("svc", "a"), ("le", "0.1")], 10.0),
                (&[("svc", "a"), ("le", "1")], 50.0),
                (&[("svc", "a"), ("le", "+Inf")], 100.0),
            ],
        );

        let result = input.histogram();

        assert!(result.get_context().histogram);
        assert_eq!(3, result.get_samples().len());
    }

    #[test]
    fn test_non_monotonic_group_is_dropped() {
        let input = family(
            "latency",
            &[
                (&[("svc", "bad"), ("le", "0.1")], 50.0),
                (&[("svc", "bad"), ("le", "1")], 10.0),
                (&[("svc", "ok"), ("le", "0.1")], 1.0),
                (&[("svc", "ok"), ("le", "1")], 2.0),
            ],
        );

        let result = input.histogram();

        assert!(
            result
                .get_samples()
                .iter()
                .all(|s| s.get_labels()["svc"] == "ok")
        );
    }

    #[test]
    fn test_median_interpolates_between_bucket_midpoints() {
        let input = family(
            "latency",
            &[
                (&[("le", "0.1")], 10.0),
                (&[("le", "1")], 50.0),
                (&[("le", "+Inf")], 100.0),
            ],
        );

        let result = input.histogram().histogram_percentile(&[50]).unwrap();

        assert_eq!(1, result.get_samples().len());
        let sample = &result.get_samples()[0];
        assert_eq!("50", sample.get_labels()["p"]);
        assert!((sample.get_value() - 0.55).abs() < 1e-3);
    }

    #[test]
    fn test_percentile_outside_range_is_rejected() {
        let input = family("latency", &[(&[("le", "+Inf")], 10.0)]).histogram();

        assert!(input.histogram_percentile(&[101]).is_err());
    }

    #[test]
    fn test_percentile_without_histogram_is_rejected() {
        let input = family("latency", &[(&[("le", "+Inf")], 10.0)]);

        assert!(input.histogram_percentile(&[50]).is_err());
    }
}
