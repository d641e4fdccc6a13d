//! Message filters
//!
//! A filter spec has the form `<type>:<condition>`. The only type is `header`
//! (alias `h`) whose condition is `<key>=<value>`: the message must carry a
//! header with exactly that key and value. Every configured predicate must
//! hold for a message to be accepted; an empty chain accepts everything.

use bytes::Bytes;
use kafkacli_client::Message;
use std::str::FromStr;
use thiserror::Error;

/// A filter spec that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Invalid filter {spec:?}. must be in <filter-type>:<filter-condition> format")]
    Malformed { spec: String },

    #[error("Unknown filter type {kind:?} in filter {spec:?}")]
    UnknownType { kind: String, spec: String },

    #[error("Invalid filter {spec:?}: condition {condition:?} must be in <x>=<y> format")]
    InvalidCondition { condition: String, spec: String },
}

/// A single parsed filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// At least one header has exactly this key and value
    HeaderEquals { key: Bytes, value: Bytes },
}

impl Predicate {
    pub fn header<K: Into<Bytes>, V: Into<Bytes>>(key: K, value: V) -> Self {
        Self::HeaderEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        match self {
            Self::HeaderEquals { key, value } => message
                .headers
                .iter()
                .any(|header| header.key == *key && header.value == *value),
        }
    }
}

impl FromStr for Predicate {
    type Err = FilterError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (kind, condition) = spec.split_once(':').ok_or_else(|| FilterError::Malformed {
            spec: spec.to_string(),
        })?;

        match kind {
            "header" | "h" => {
                // The value keeps any further '=' characters.
                let (key, value) =
                    condition
                        .split_once('=')
                        .ok_or_else(|| FilterError::InvalidCondition {
                            condition: condition.to_string(),
                            spec: spec.to_string(),
                        })?;
                Ok(Self::header(key.to_string(), value.to_string()))
            }
            _ => Err(FilterError::UnknownType {
                kind: kind.to_string(),
                spec: spec.to_string(),
            }),
        }
    }
}

/// Logical AND of predicates, evaluated in the order they were given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    predicates: Vec<Predicate>,
}

impl FilterChain {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    /// Parse every spec, failing on the first malformed one
    pub fn parse<I, S>(specs: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let predicates = specs
            .into_iter()
            .map(|spec| spec.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { predicates })
    }

    pub fn accepts(&self, message: &Message) -> bool {
        self.predicates.iter().all(|p| p.matches(message))
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }
}
