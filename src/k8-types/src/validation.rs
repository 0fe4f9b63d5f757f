//!
//! # Field validation errors
//!
//! Returned by validation hooks. An empty list means valid.
//!
use std::fmt;

use serde_json::Value;
use thiserror::Error;

pub type ErrorList = Vec<FieldError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Required,
    Invalid,
    Forbidden,
    NotSupported,
    Duplicate,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Self::Required => "Required value",
            Self::Invalid => "Invalid value",
            Self::Forbidden => "Forbidden",
            Self::NotSupported => "Unsupported value",
            Self::Duplicate => "Duplicate value",
        };
        write!(f, "{}", label)
    }
}

/// dotted path to a field, e.g. `spec.ports[0].name`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new<S: Into<String>>(root: S) -> Self {
        Self(root.into())
    }

    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_owned())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field}: {error_type}{}", detail_suffix(.bad_value, .detail))]
pub struct FieldError {
    pub error_type: ErrorType,
    pub field: FieldPath,
    pub bad_value: Option<Value>,
    pub detail: String,
}

fn detail_suffix(bad_value: &Option<Value>, detail: &str) -> String {
    let mut suffix = String::new();
    if let Some(value) = bad_value {
        suffix.push_str(&format!(": {}", value));
    }
    if !detail.is_empty() {
        suffix.push_str(&format!(": {}", detail));
    }
    suffix
}

impl FieldError {
    pub fn required<S: Into<String>>(field: FieldPath, detail: S) -> Self {
        Self {
            error_type: ErrorType::Required,
            field,
            bad_value: None,
            detail: detail.into(),
        }
    }

    pub fn invalid<V: Into<Value>, S: Into<String>>(field: FieldPath, value: V, detail: S) -> Self {
        Self {
            error_type: ErrorType::Invalid,
            field,
            bad_value: Some(value.into()),
            detail: detail.into(),
        }
    }

    pub fn forbidden<S: Into<String>>(field: FieldPath, detail: S) -> Self {
        Self {
            error_type: ErrorType::Forbidden,
            field,
            bad_value: None,
            detail: detail.into(),
        }
    }

    pub fn not_supported<V: Into<Value>>(field: FieldPath, value: V, valid: &[&str]) -> Self {
        Self {
            error_type: ErrorType::NotSupported,
            field,
            bad_value: Some(value.into()),
            detail: format!("supported values: {}", valid.join(", ")),
        }
    }

    pub fn duplicate<V: Into<Value>>(field: FieldPath, value: V) -> Self {
        Self {
            error_type: ErrorType::Duplicate,
            field,
            bad_value: Some(value.into()),
            detail: String::new(),
        }
    }
}

/// single line summary of all errors
pub fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|err| err.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test {

    use super::summarize;
    use super::FieldError;
    use super::FieldPath;

    #[test]
    fn test_field_path() {
        let path = FieldPath::new("spec").child("ports").index(1).child("name");
        assert_eq!(path.as_str(), "spec.ports[1].name");
        assert_eq!(FieldPath::default().child("metadata").as_str(), "metadata");
    }

    #[test]
    fn test_error_display() {
        let err = FieldError::invalid(FieldPath::new("spec").child("message"), "", "must not be empty");
        assert_eq!(
            err.to_string(),
            "spec.message: Invalid value: \"\": must not be empty"
        );

        let errors = vec![
            FieldError::required(FieldPath::new("metadata").child("name"), ""),
            FieldError::forbidden(FieldPath::new("spec"), "immutable"),
        ];
        assert_eq!(
            summarize(&errors),
            "metadata.name: Required value, spec: Forbidden: immutable"
        );
    }
}
