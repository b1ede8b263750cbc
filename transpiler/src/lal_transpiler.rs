// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use analysis_engine_lal_parser::LalParser;
use analysis_engine_model::{FilterStep, LalProgram};

use crate::compose::sha256_hex;
use crate::TranspileError;

/// Compile one LAL DSL body: canonicalize, parse, validate every embedded
/// regular expression, and key the program by the canonical text's SHA-256.
pub fn transpile_lal_script(file: &str, dsl: &str) -> Result<LalProgram, TranspileError> {
    let canonical = dsl.trim();
    let script = LalParser::parse_script(file, canonical)?;

    for filter in script.get_filters() {
        validate_steps(file, filter.get_steps())?;
    }

    Ok(LalProgram {
        dsl_hash: sha256_hex(canonical),
        script,
    })
}

fn validate_steps(file: &str, steps: &[FilterStep]) -> Result<(), TranspileError> {
    for step in steps {
        match step {
            FilterStep::Text { regexp, .. } => {
                regex::Regex::new(regexp).map_err(|source| TranspileError::InvalidRegex {
                    file: file.to_string(),
                    pattern: regexp.to_string(),
                    source,
                })?;
            }
            FilterStep::If {
                branches,
                else_steps,
                ..
            } => {
                for branch in branches {
                    validate_steps(file, branch.get_steps())?;
                }
                validate_steps(file, else_steps)?;
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_canonicalization_makes_hashes_stable() {
        let dsl = "filter { json {} }";
        let padded = format!("\n\n  {dsl}  \n");

        let first = transpile_lal_script("a.yaml", dsl).unwrap();
        let second = transpile_lal_script("b.yaml", &padded).unwrap();

        assert_eq!(first.dsl_hash, second.dsl_hash);
        assert_eq!(first.script, second.script);
    }

    #[test]
    fn test_invalid_regexp_aborts_the_build() {
        let error =
            transpile_lal_script("a.yaml", "filter { text { regexp \"([\" } }").unwrap_err();

        assert!(matches!(error, TranspileError::InvalidRegex { .. }));
    }

    #[test]
    fn test_different_bodies_hash_differently() {
        let a = transpile_lal_script("a.yaml", "filter { json {} }").unwrap();
        let b = transpile_lal_script("a.yaml", "filter { json {} abort {} }").unwrap();

        assert_ne!(a.dsl_hash, b.dsl_hash);
    }
}
