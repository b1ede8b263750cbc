// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use crate::counter_window::{CounterWindow, WindowObservation};
use crate::sample::{Sample, SampleFamily};
use crate::Error;

#[derive(Debug, Clone, Copy)]
enum CounterOp {
    Rate,
    Increase,
    Irate,
}

/// Parse the ISO-8601 duration subset used for counter windows
/// (`PT15S`, `PT1M`, `PT2H`, `P1D`, and combinations) into milliseconds.
pub(crate) fn parse_window(window: &str) -> Result<i64, Error> {
    let bad = || Error::InvalidWindow(window.into());

    let rest = window.strip_prefix('P').ok_or_else(bad)?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut total_ms: i64 = 0;
    let mut seen = false;

    let mut parse_fields = |text: &str, units: &[(char, i64)]| -> Result<(), Error> {
        let mut digits = String::new();
        for c in text.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let factor = units
                .iter()
                .find(|(unit, _)| *unit == c)
                .map(|(_, f)| *f)
                .ok_or_else(bad)?;
            let value: i64 = digits.parse().map_err(|_| bad())?;
            digits.clear();
            total_ms += value * factor;
            seen = true;
        }
        if digits.is_empty() { Ok(()) } else { Err(bad()) }
    };

    parse_fields(date_part, &[('D', 24 * 60 * 60 * 1_000)])?;
    parse_fields(
        time_part,
        &[('H', 60 * 60 * 1_000), ('M', 60 * 1_000), ('S', 1_000)],
    )?;

    if !seen {
        return Err(Error::InvalidWindow(window.into()));
    }

    Ok(total_ms)
}

impl SampleFamily {
    /// Per-second rate between the two most recent observations of each
    /// label set, with counter resets clamped to zero.
    pub fn rate(
        &self,
        window: &str,
        counter_window: &CounterWindow,
        discriminator: Option<&str>,
    ) -> Result<SampleFamily, Error> {
        self.counter_op(CounterOp::Rate, window, counter_window, discriminator)
    }

    /// Absolute increase between the two most recent observations.
    pub fn increase(
        &self,
        window: &str,
        counter_window: &CounterWindow,
        discriminator: Option<&str>,
    ) -> Result<SampleFamily, Error> {
        self.counter_op(CounterOp::Increase, window, counter_window, discriminator)
    }

    /// Instantaneous rate from the last two observations.
    pub fn irate(
        &self,
        window: &str,
        counter_window: &CounterWindow,
        discriminator: Option<&str>,
    ) -> Result<SampleFamily, Error> {
        self.counter_op(CounterOp::Irate, window, counter_window, discriminator)
    }

    fn counter_op(
        &self,
        op: CounterOp,
        window: &str,
        counter_window: &CounterWindow,
        discriminator: Option<&str>,
    ) -> Result<SampleFamily, Error> {
        let window_ms = parse_window(window)?;

        if self.is_empty() {
            return Ok(SampleFamily::empty());
        }

        let name = self.get_name().expect("non-empty family has a name");
        let window_key_name = match discriminator {
            Some(d) => format!("{name}#{d}"),
            None => name.to_string(),
        };

        let mut samples = Vec::new();
        for sample in self.get_samples() {
            // irate always works off the most recent pair; the lookback cap
            // applies to the windowed forms only.
            let lookback = match op {
                CounterOp::Irate => 0,
                _ => window_ms,
            };

            let observation = counter_window.observe(
                &window_key_name,
                sample.get_labels(),
                sample.get_value(),
                sample.get_timestamp(),
                lookback,
            );

            let WindowObservation::Pair {
                prev_value,
                prev_timestamp,
            } = observation
            else {
                continue;
            };

            let increase = (sample.get_value() - prev_value).max(0.0);
            let elapsed_seconds = (sample.get_timestamp() - prev_timestamp) as f64 / 1_000.0;

            let value = match op {
                CounterOp::Increase => increase,
                CounterOp::Rate | CounterOp::Irate => {
                    if elapsed_seconds == 0.0 {
                        continue;
                    }
                    increase / elapsed_seconds
                }
            };

            samples.push(Sample::new(
                name,
                sample.get_labels().clone(),
                value,
                sample.get_timestamp(),
            ));
        }

        Ok(SampleFamily::with_context(
            samples,
            self.get_context().clone(),
        ))
    }
}
