//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::assertion::ToleranceAssertion;
use crate::common::{Error, Result};

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// The tutorial script and how to run it
    pub tutorial: TutorialConfig,
    /// Tolerance checks on the reported results
    #[serde(default)]
    pub asserts: Vec<ToleranceAssertion>,
}

/// How to execute the tutorial script
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct TutorialConfig {
    /// Path to the script; may use `@TUTORIALS_DIR@`
    pub filepath: PathBuf,
    /// Program used to run the script (e.g., "python3"); run directly if unset
    pub interpreter: Option<String>,
    /// Extra arguments passed to the script
    #[serde(default)]
    pub args: Vec<String>,
    /// Whether the script needs a GPU
    #[serde(default)]
    pub gpu: bool,
    /// Whether to force deterministic seeding
    #[serde(default)]
    pub random_seeds: bool,
    /// Seed to force; falls back to the configured default
    pub seed: Option<u64>,
    /// Features that must be available for the script to run
    #[serde(default)]
    pub requires_features: Vec<String>,
    /// Parameters forwarded to the script as a JSON object
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl TestScenario {
    /// Load and validate a scenario from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read test scenario '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a scenario from YAML text
    pub fn parse(content: &str) -> Result<Self> {
        let scenario: TestScenario = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))?;

        if scenario.name.trim().is_empty() {
            return Err(Error::Config("Scenario name must not be empty".to_string()));
        }
        for assertion in &scenario.asserts {
            assertion.validate()?;
        }

        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_analysis_scenario() {
        let scenario = TestScenario::parse(
            r#"
name: error_analysis_part2
tutorial:
  filepath: "@TUTORIALS_DIR@/error_analysis/error_analysis_part2.py"
  interpreter: python3
  gpu: false
  random_seeds: true
asserts:
  - { attribute: sem, expected: 0.025, delta: 0.002 }
  - { attribute: N_eff, expected: 7700, delta: 500 }
  - { attribute: tau_int, expected: 6.6, delta: 0.4 }
  - { attribute: sem_2, expected: 0.37, delta: 0.08 }
"#,
        )
        .unwrap();

        assert_eq!(scenario.name, "error_analysis_part2");
        assert!(scenario.tutorial.random_seeds);
        assert!(!scenario.tutorial.gpu);
        assert_eq!(scenario.tutorial.interpreter.as_deref(), Some("python3"));
        assert_eq!(scenario.asserts.len(), 4);
        assert_eq!(scenario.asserts[1].expected, 7700.0);
    }

    #[test]
    fn test_defaults() {
        let scenario = TestScenario::parse(
            r#"
name: minimal
tutorial:
  filepath: run.sh
"#,
        )
        .unwrap();
        assert!(!scenario.tutorial.gpu);
        assert!(!scenario.tutorial.random_seeds);
        assert!(scenario.tutorial.seed.is_none());
        assert!(scenario.tutorial.requires_features.is_empty());
        assert!(scenario.asserts.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = TestScenario::parse(
            r#"
name: typo
tutorial:
  filepath: run.sh
  random_seed: true
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("random_seed"));
    }

    #[test]
    fn test_invalid_assertion_rejected() {
        let err = TestScenario::parse(
            r#"
name: bad
tutorial:
  filepath: run.sh
asserts:
  - { attribute: "fit_params[x]", expected: 0.024, delta: 0.002 }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
