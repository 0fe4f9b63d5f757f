//!
//! # Selectors
//!
//! Equality based label and field selectors: `k=v`, `k==v`, `k!=v`,
//! `k` (exists) and `!k` (does not exist), comma separated.
//!
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::ListArg;

pub type Set = HashMap<String, String>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectorError {
    #[error("invalid selector term \"{0}\"")]
    InvalidTerm(String),
    #[error("empty key in selector term \"{0}\"")]
    EmptyKey(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, set: &Set) -> bool {
        match self {
            Self::Equals(key, value) => set.get(key) == Some(value),
            Self::NotEquals(key, value) => set.get(key) != Some(value),
            Self::Exists(key) => set.contains_key(key),
            Self::DoesNotExist(key) => !set.contains_key(key),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Equals(key, value) => write!(f, "{}={}", key, value),
            Self::NotEquals(key, value) => write!(f, "{}!={}", key, value),
            Self::Exists(key) => write!(f, "{}", key),
            Self::DoesNotExist(key) => write!(f, "!{}", key),
        }
    }
}

fn parse_term(term: &str) -> Result<Requirement, SelectorError> {
    let check_key = |key: &str| -> Result<String, SelectorError> {
        let key = key.trim();
        if key.is_empty() {
            Err(SelectorError::EmptyKey(term.to_owned()))
        } else if key.contains(|c: char| c.is_whitespace() || c == '!' || c == '=') {
            Err(SelectorError::InvalidTerm(term.to_owned()))
        } else {
            Ok(key.to_owned())
        }
    };

    if let Some((key, value)) = term.split_once("!=") {
        return Ok(Requirement::NotEquals(check_key(key)?, value.trim().to_owned()));
    }
    if let Some((key, value)) = term.split_once("==") {
        return Ok(Requirement::Equals(check_key(key)?, value.trim().to_owned()));
    }
    if let Some((key, value)) = term.split_once('=') {
        if value.contains('=') {
            return Err(SelectorError::InvalidTerm(term.to_owned()));
        }
        return Ok(Requirement::Equals(check_key(key)?, value.trim().to_owned()));
    }
    if let Some(key) = term.strip_prefix('!') {
        return Ok(Requirement::DoesNotExist(check_key(key)?));
    }
    Ok(Requirement::Exists(check_key(term)?))
}

/// conjunction of requirements, empty selector matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let requirements = selector
            .split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(parse_term)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, set: &Set) -> bool {
        self.requirements.iter().all(|req| req.matches(set))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let terms: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", terms.join(","))
    }
}

/// label and field selectors applied to list results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPredicate {
    pub label: Selector,
    pub field: Selector,
}

impl SelectionPredicate {
    pub fn from_arg(arg: &ListArg) -> Result<Self, SelectorError> {
        let label = match &arg.label_selector {
            Some(selector) => Selector::parse(selector)?,
            None => Selector::everything(),
        };
        let field = match &arg.field_selector {
            Some(selector) => Selector::parse(selector)?,
            None => Selector::everything(),
        };
        Ok(Self { label, field })
    }

    pub fn is_everything(&self) -> bool {
        self.label.is_empty() && self.field.is_empty()
    }

    pub fn matches(&self, labels: &Set, fields: &Set) -> bool {
        self.label.matches(labels) && self.field.matches(fields)
    }
}
