// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use analysis_engine_model::ArithmeticOp;

use crate::sample::SampleFamily;

/// Scalar arithmetic shared by every dispatch shape. Division by zero yields
/// `NaN`, never an error.
pub(crate) fn apply_op(op: ArithmeticOp, left: f64, right: f64) -> f64 {
    match op {
        ArithmeticOp::Add => left + right,
        ArithmeticOp::Subtract => left - right,
        ArithmeticOp::Multiply => left * right,
        ArithmeticOp::Divide => {
            if right == 0.0 {
                f64::NAN
            } else {
                left / right
            }
        }
    }
}

impl SampleFamily {
    /// Broadcast a scalar over every sample. `scalar_on_left` preserves
    /// operand order for the non-commutative operators.
    pub fn scalar_op(&self, op: ArithmeticOp, scalar: f64, scalar_on_left: bool) -> SampleFamily {
        if self.is_empty() {
            return SampleFamily::empty();
        }

        let samples = self
            .get_samples()
            .iter()
            .map(|sample| {
                let value = if scalar_on_left {
                    apply_op(op, scalar, sample.get_value())
                } else {
                    apply_op(op, sample.get_value(), scalar)
                };
                sample.with_value(value)
            })
            .collect();

        SampleFamily::with_context(samples, self.get_context().clone())
    }

    /// Inner join on the label mapping: only label sets present on both
    /// sides survive, combined pairwise.
    pub fn family_op(&self, op: ArithmeticOp, other: &SampleFamily) -> SampleFamily {
        if self.is_empty() || other.is_empty() {
            return SampleFamily::empty();
        }

        let mut samples = Vec::new();
        for left in self.get_samples() {
            if let Some(right) = other
                .get_samples()
                .iter()
                .find(|s| s.get_labels() == left.get_labels())
            {
                let value = apply_op(op, left.get_value(), right.get_value());
                let timestamp = left.get_timestamp().max(right.get_timestamp());
                samples.push(crate::sample::Sample::new(
                    left.get_name(),
                    left.get_labels().clone(),
                    value,
                    timestamp,
                ));
            }
        }

        SampleFamily::with_context(samples, self.get_context().clone())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sample::test_support::*;
    use crate::sample::SampleFamily;

    #[test]
    fn test_scalar_broadcast() {
        let input = family("cpu", &[(&[("svc", "a")], 1.0), (&[("svc", "b")], 2.0)]);

        let result = input.scalar_op(ArithmeticOp::Multiply, 100.0, false);

        assert_eq!(
            family("cpu", &[(&[("svc", "a")], 100.0), (&[("svc", "b")], 200.0)]),
            result
        );
    }

    #[test]
    fn test_scalar_on_left_preserves_order() {
        let input = family("cpu", &[(&[("svc", "a")], 4.0)]);

        let result = input.scalar_op(ArithmeticOp::Subtract, 10.0, true);

        assert_eq!(6.0, result.get_samples()[0].get_value());
    }

    #[test]
    fn test_family_join_keeps_matching_label_sets() {
        let used = family("mem", &[(&[("host", "a")], 30.0), (&[("host", "b")], 50.0)]);
        let total = family("mem_total", &[(&[("host", "a")], 60.0)]);

        let result = used.family_op(ArithmeticOp::Divide, &total);

        assert_eq!(1, result.get_samples().len());
        assert_eq!(0.5, result.get_samples()[0].get_value());
        assert_eq!("mem", result.get_samples()[0].get_name());
    }

    #[test]
    fn test_division_by_zero_yields_nan() {
        let left = family("m", &[(&[("h", "a")], 1.0)]);
        let right = family("m2", &[(&[("h", "a")], 0.0)]);

        let joined = left.family_op(ArithmeticOp::Divide, &right);
        assert!(joined.get_samples()[0].get_value().is_nan());

        let broadcast = left.scalar_op(ArithmeticOp::Divide, 0.0, false);
        assert!(broadcast.get_samples()[0].get_value().is_nan());
    }

    #[test]
    fn test_empty_operand_propagates() {
        let left = family("m", &[(&[("h", "a")], 1.0)]);

        assert!(left.family_op(ArithmeticOp::Add, &SampleFamily::empty()).is_empty());
        assert!(SampleFamily::empty().scalar_op(ArithmeticOp::Add, 1.0, false).is_empty());
    }
}
