//! Label selectors for nodes and pods
//!
//! Supports the comma-separated `key=value` form only: every requirement is
//! an exact match and all requirements must hold (AND). Set-based and
//! negation operators are not supported.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SelectorError {
    #[error("empty label selector")]
    Empty,

    #[error("invalid label selector term '{0}': expected key=value")]
    InvalidTerm(String),
}

/// An ordered list of exact-match label requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<(String, String)>,
}

impl Selector {
    /// Parse a selector from its `k1=v1,k2=v2` string form.
    ///
    /// Whitespace around keys and values is trimmed. A term without `=` or
    /// with an empty key is rejected.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        if input.trim().is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut requirements = Vec::new();
        for term in input.split(',') {
            let Some((key, value)) = term.split_once('=') else {
                return Err(SelectorError::InvalidTerm(term.trim().to_string()));
            };
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                return Err(SelectorError::InvalidTerm(term.trim().to_string()));
            }
            requirements.push((key.to_string(), value.to_string()));
        }

        Ok(Self { requirements })
    }

    /// True when every requirement is present in `labels` with an equal value.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }

    pub fn requirements(&self) -> &[(String, String)] {
        &self.requirements
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.requirements {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}
