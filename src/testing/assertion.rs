//! Tolerance assertions
//!
//! An assertion names an attribute of the tutorial results, an expected
//! value and an absolute tolerance. It passes iff
//! `abs(actual - expected) <= delta`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::module::{TutorialModule, Value};
use crate::common::{Error, Result};

/// Check that `actual` is within `delta` of `expected`
///
/// Identical values always pass, which keeps infinities comparable.
/// NaN on either side never passes.
pub fn assert_close(attribute: &str, actual: f64, expected: f64, delta: f64) -> Result<()> {
    if actual == expected || (actual - expected).abs() <= delta {
        Ok(())
    } else {
        Err(Error::mismatch(attribute, actual, expected, delta))
    }
}

/// Reference to a reported value: `name` or `name[index]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    pub name: String,
    pub index: Option<usize>,
}

impl AttributePath {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid =
            |reason: &str| Error::Config(format!("Invalid attribute '{}': {}", s, reason));

        let (name, index) = match s.find('[') {
            Some(open) => {
                let rest = &s[open + 1..];
                let inner = rest
                    .strip_suffix(']')
                    .ok_or_else(|| invalid("missing closing ']'"))?;
                let index = inner
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid("index must be a non-negative integer"))?;
                (&s[..open], Some(index))
            }
            None => (s, None),
        };

        if name.is_empty() {
            return Err(invalid("empty name"));
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return Err(invalid("name may only contain letters, digits, '_' and '.'"));
        }

        Ok(Self {
            name: name.to_string(),
            index,
        })
    }

    /// Look up the scalar this path refers to
    pub fn resolve(&self, module: &TutorialModule) -> Result<f64> {
        let value = module
            .get(&self.name)
            .ok_or_else(|| Error::AttributeNotFound {
                name: self.name.clone(),
                available: module.names(),
            })?;

        match (value, self.index) {
            (Value::Scalar(v), None) => Ok(*v),
            (Value::Array(items), Some(index)) => {
                items.get(index).copied().ok_or_else(|| Error::IndexOutOfRange {
                    name: self.name.clone(),
                    index,
                    len: items.len(),
                })
            }
            (Value::Scalar(_), Some(_)) => Err(Error::AttributeShape {
                name: self.name.clone(),
                reason: "is a scalar and cannot be indexed".to_string(),
            }),
            (Value::Array(items), None) => Err(Error::AttributeShape {
                name: self.name.clone(),
                reason: format!("is an array of {} values; select one with [index]", items.len()),
            }),
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.name, index),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A single tolerance check from a scenario file
#[derive(Deserialize, Debug, Clone)]
pub struct ToleranceAssertion {
    /// Attribute path, e.g. `avg` or `fit_params[2]`
    pub attribute: String,
    /// Reference value
    pub expected: f64,
    /// Absolute tolerance
    pub delta: f64,
}

impl ToleranceAssertion {
    /// Validate the assertion before anything runs
    pub fn validate(&self) -> Result<AttributePath> {
        if !self.delta.is_finite() || self.delta < 0.0 {
            return Err(Error::Config(format!(
                "Assertion on '{}': delta must be finite and non-negative, got {}",
                self.attribute, self.delta
            )));
        }
        if self.expected.is_nan() {
            return Err(Error::Config(format!(
                "Assertion on '{}': expected value is NaN",
                self.attribute
            )));
        }
        AttributePath::parse(&self.attribute)
    }

    /// Evaluate against executed tutorial results
    pub fn evaluate(&self, module: &TutorialModule) -> AssertionReport {
        let outcome = self.validate().and_then(|path| {
            let actual = path.resolve(module)?;
            assert_close(&path.to_string(), actual, self.expected, self.delta).map(|()| actual)
        });

        match outcome {
            Ok(actual) => AssertionReport {
                attribute: self.attribute.clone(),
                expected: self.expected,
                delta: self.delta,
                actual: Some(actual),
                passed: true,
                message: None,
            },
            Err(e) => AssertionReport {
                attribute: self.attribute.clone(),
                expected: self.expected,
                delta: self.delta,
                actual: match &e {
                    Error::AssertionMismatch { actual, .. } => Some(*actual),
                    _ => None,
                },
                passed: false,
                message: Some(e.to_string()),
            },
        }
    }
}

/// Result of evaluating one assertion
#[derive(Debug, Clone, Serialize)]
pub struct AssertionReport {
    pub attribute: String,
    pub expected: f64,
    pub delta: f64,
    pub actual: Option<f64>,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn check(actual: f64, expected: f64, delta: f64) -> bool {
        assert_close("x", actual, expected, delta).is_ok()
    }

    fn module(entries: &[(&str, Value)]) -> TutorialModule {
        TutorialModule::new(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn assertion(attribute: &str, expected: f64, delta: f64) -> ToleranceAssertion {
        ToleranceAssertion {
            attribute: attribute.to_string(),
            expected,
            delta,
        }
    }

    #[test]
    fn test_identical_values_pass_with_zero_delta() {
        for x in [0.0, -3.5, 13.35, 7700.0, 1e-300, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(check(x, x, 0.0), "{} should equal itself", x);
        }
    }

    #[test]
    fn test_just_outside_delta_fails() {
        for (x, delta, eps) in [(1.0, 0.5, 1e-9), (13.35, 0.1, 1e-6), (7700.0, 500.0, 1e-3)] {
            assert!(!check(x + delta + eps, x, delta));
            assert!(!check(x - delta - eps, x, delta));
        }
    }

    #[test]
    fn test_nan_never_passes() {
        assert!(!check(f64::NAN, 1.0, f64::MAX));
        assert!(!check(1.0, f64::NAN, f64::MAX));
        assert!(!check(f64::NAN, f64::NAN, 0.0));
    }

    #[test]
    fn test_fit_parameter_tolerance() {
        assert!(check(0.0235, 0.024, 0.002));
        assert!(!check(0.027, 0.024, 0.002));
    }

    #[test]
    fn test_average_tolerance() {
        assert!(check(13.40, 13.35, 0.1));
        assert!(!check(13.50, 13.35, 0.1));
    }

    #[test]
    fn test_wide_sem_tolerance() {
        assert!(check(0.30, 0.37, 0.08));
        assert!(!check(0.28, 0.37, 0.08));
    }

    #[test]
    fn test_mismatch_carries_details() {
        let err = assert_close("tau_int", 7.2, 6.6, 0.4).unwrap_err();
        match err {
            Error::AssertionMismatch {
                attribute,
                actual,
                expected,
                delta,
            } => {
                assert_eq!(attribute, "tau_int");
                assert_eq!(actual, 7.2);
                assert_eq!(expected, 6.6);
                assert_eq!(delta, 0.4);
            }
            other => panic!("Expected AssertionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_attribute_paths() {
        let path = AttributePath::parse("avg").unwrap();
        assert_eq!(path.name, "avg");
        assert_eq!(path.index, None);

        let path = AttributePath::parse("fit_params[2]").unwrap();
        assert_eq!(path.name, "fit_params");
        assert_eq!(path.index, Some(2));
        assert_eq!(path.to_string(), "fit_params[2]");

        assert!(AttributePath::parse("fit_params[").is_err());
        assert!(AttributePath::parse("fit_params[-1]").is_err());
        assert!(AttributePath::parse("[0]").is_err());
        assert!(AttributePath::parse("a b").is_err());
    }

    #[test]
    fn test_resolve_errors() {
        let m = module(&[
            ("avg", Value::Scalar(13.4)),
            ("fit_params", Value::Array(vec![1.0, 2.0, 0.024])),
        ]);

        let missing = AttributePath::parse("sem").unwrap().resolve(&m).unwrap_err();
        match missing {
            Error::AttributeNotFound { available, .. } => {
                assert_eq!(available, vec!["avg", "fit_params"]);
            }
            other => panic!("Expected AttributeNotFound, got {:?}", other),
        }

        let out_of_range = AttributePath::parse("fit_params[3]")
            .unwrap()
            .resolve(&m)
            .unwrap_err();
        assert!(matches!(out_of_range, Error::IndexOutOfRange { len: 3, .. }));

        let whole_array = AttributePath::parse("fit_params").unwrap().resolve(&m).unwrap_err();
        assert!(matches!(whole_array, Error::AttributeShape { .. }));

        let indexed_scalar = AttributePath::parse("avg[0]").unwrap().resolve(&m).unwrap_err();
        assert!(matches!(indexed_scalar, Error::AttributeShape { .. }));
    }

    #[test]
    fn test_evaluate_reports() {
        let m = module(&[
            ("avg", Value::Scalar(13.50)),
            ("fit_params", Value::Array(vec![1.0, 2.0, 0.0235])),
        ]);

        let passed = assertion("fit_params[2]", 0.024, 0.002).evaluate(&m);
        assert!(passed.passed);
        assert_eq!(passed.actual, Some(0.0235));
        assert!(passed.message.is_none());

        let failed = assertion("avg", 13.35, 0.1).evaluate(&m);
        assert!(!failed.passed);
        assert_eq!(failed.actual, Some(13.50));
        assert!(failed.message.unwrap().contains("avg"));

        let missing = assertion("sem", 0.025, 0.002).evaluate(&m);
        assert!(!missing.passed);
        assert_eq!(missing.actual, None);
    }

    #[test]
    fn test_validate_rejects_bad_delta() {
        assert!(assertion("avg", 1.0, -0.1).validate().is_err());
        assert!(assertion("avg", 1.0, f64::NAN).validate().is_err());
        assert!(assertion("avg", 1.0, f64::INFINITY).validate().is_err());
        assert!(assertion("avg", f64::NAN, 0.1).validate().is_err());
        assert!(assertion("avg", 1.0, 0.0).validate().is_ok());
    }
}
