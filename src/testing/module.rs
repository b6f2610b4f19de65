//! Tutorial results
//!
//! A tutorial script reports its results as a flat JSON object mapping
//! attribute names to numbers or arrays of numbers. [`TutorialModule`] is
//! the typed form of that object.
//!
//! Non-finite values are accepted as the bare `NaN`, `Infinity` and
//! `-Infinity` tokens Python's `json` module writes, or as those same
//! words in JSON strings.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;

use crate::common::{Error, Result};

/// Bare tokens outside the JSON grammar, longest first
const NON_FINITE_TOKENS: &[&str] = &["-Infinity", "Infinity", "NaN"];

/// A single reported value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Array(Vec<f64>),
}

impl Value {
    /// Compare bit patterns, so NaN equals NaN and 0.0 differs from -0.0
    pub fn bit_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a.to_bits() == b.to_bits(),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        }
    }
}

/// Results of one executed tutorial
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TutorialModule {
    attributes: BTreeMap<String, Value>,
}

impl TutorialModule {
    pub fn new(attributes: BTreeMap<String, Value>) -> Self {
        Self { attributes }
    }

    /// Parse the JSON object a script wrote to its results file
    ///
    /// `origin` is only used in error messages.
    pub fn from_json(content: &str, origin: &Path) -> Result<Self> {
        let content = quote_non_finite(content);
        let raw: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| Error::malformed(origin, e.to_string()))?;

        let object = raw
            .as_object()
            .ok_or_else(|| Error::malformed(origin, "top-level value must be an object"))?;

        let mut attributes = BTreeMap::new();
        for (name, value) in object {
            let value = match value {
                serde_json::Value::Array(items) => {
                    let mut numbers = Vec::with_capacity(items.len());
                    for item in items {
                        let number = to_f64(item).ok_or_else(|| {
                            Error::malformed(
                                origin,
                                format!("'{}' contains non-numeric element {}", name, item),
                            )
                        })?;
                        numbers.push(number);
                    }
                    Value::Array(numbers)
                }
                other => Value::Scalar(to_f64(other).ok_or_else(|| {
                    Error::malformed(
                        origin,
                        format!("'{}' must be a number or array of numbers, got {}", name, other),
                    )
                })?),
            };
            attributes.insert(name.clone(), value);
        }

        Ok(Self { attributes })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Names of all reported attributes, sorted
    pub fn names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// First attribute whose value differs between two runs, if any
    pub fn first_difference(&self, other: &TutorialModule) -> Option<String> {
        for (name, value) in &self.attributes {
            match other.attributes.get(name) {
                Some(v) if v.bit_identical(value) => {}
                _ => return Some(name.clone()),
            }
        }
        other
            .attributes
            .keys()
            .find(|name| !self.attributes.contains_key(*name))
            .cloned()
    }
}

fn to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

/// Wrap bare non-finite tokens outside strings in quotes
fn quote_non_finite(content: &str) -> Cow<'_, str> {
    if !NON_FINITE_TOKENS.iter().any(|t| content.contains(t)) {
        return Cow::Borrowed(content);
    }

    let mut out = String::with_capacity(content.len() + 8);
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = content;

    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(token) = NON_FINITE_TOKENS.iter().find(|t| starts_token(rest, t)) {
            out.push('"');
            out.push_str(token);
            out.push('"');
            rest = &rest[token.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    Cow::Owned(out)
}

fn starts_token(rest: &str, token: &str) -> bool {
    rest.starts_with(token)
        && !rest[token.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
}
