//! Error taxonomy shared by the services, the store and the HTTP layer.

use std::collections::BTreeMap;

use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Field path -> list of issues, suitable for form rendering.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{message}")]
    ValidationFailed { message: String, fields: FieldErrors },

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Conflict(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

pub type Result<T> = std::result::Result<T, EcommerceError>;

impl EcommerceError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized("authentication required".to_string())
    }

    pub fn forbidden() -> Self {
        Self::Unauthorized("admin privileges required".to_string())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    /// Validation failure on a single field path.
    pub fn invalid(path: impl Into<String>, issue: impl Into<String>) -> Self {
        let path = path.into();
        let issue = issue.into();
        let mut fields = FieldErrors::new();
        fields.insert(path.clone(), vec![issue.clone()]);
        Self::ValidationFailed {
            message: format!("{path}: {issue}"),
            fields,
        }
    }

    /// Short name of the error kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unexpected(_) => "unexpected",
        }
    }

    /// Re-roots validation field paths under `prefix`; other kinds pass through.
    pub fn within(self, prefix: &str) -> Self {
        match self {
            Self::ValidationFailed { message, fields } => {
                let fields: FieldErrors = fields.into_iter().map(|(path, issues)| (format!("{prefix}.{path}"), issues)).collect();
                let message = match fields.iter().next() {
                    Some((path, issues)) if fields.len() == 1 => {
                        format!("{path}: {}", issues.first().map(String::as_str).unwrap_or("invalid"))
                    }
                    _ => message,
                };
                Self::ValidationFailed { message, fields }
            }
            other => other,
        }
    }

    /// Issues recorded for `path`, if this is a validation failure.
    pub fn field_issues(&self, path: &str) -> Option<&[String]> {
        match self {
            Self::ValidationFailed { fields, .. } => fields.get(path).map(Vec::as_slice),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for EcommerceError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        flatten_validation_errors(&errors, None, &mut fields);
        let message = match fields.iter().next() {
            Some((path, issues)) if fields.len() == 1 => {
                format!("{path}: {}", issues.first().map(String::as_str).unwrap_or("invalid"))
            }
            _ => "invalid input".to_string(),
        };
        Self::ValidationFailed { message, fields }
    }
}

fn flatten_validation_errors(errors: &ValidationErrors, prefix: Option<&str>, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{field}"),
            None => (*field).to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                let issues = out.entry(path).or_default();
                for error in list {
                    let issue = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    issues.push(issue);
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_validation_errors(inner, Some(&path), out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_validation_errors(inner, Some(&format!("{path}[{index}]")), out);
                }
            }
        }
    }
}

impl From<sqlx::Error> for EcommerceError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &error {
            if db.is_unique_violation() {
                let what = db.constraint().unwrap_or("unique constraint");
                return Self::Conflict(format!("a record violating {what} already exists"));
            }
            if db.is_foreign_key_violation() {
                return Self::Conflict("record is still referenced".to_string());
            }
        }
        Self::Unexpected(error.to_string())
    }
}
