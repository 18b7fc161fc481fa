use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// SchemaError
// ---------------------------------------------------------------------------

/// One structural problem in a policy document, located by its dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// The complete list of schema errors found in one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaErrors(pub Vec<SchemaError>);

impl SchemaErrors {
    pub fn iter(&self) -> impl Iterator<Item = &SchemaError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.0.iter().any(|e| e.path == path)
    }
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} schema error(s)", self.0.len())?;
        for e in &self.0 {
            write!(f, "\n  - {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

// ---------------------------------------------------------------------------
// MayorError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MayorError {
    #[error("invalid policy: {0}")]
    Schema(#[from] SchemaErrors),

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("empty path cannot be matched")]
    EmptyPath,

    #[error("unknown file(s) not in the setup catalog: {}", .0.join(", "))]
    UnknownFile(Vec<String>),

    #[error("custom setup mode requires at least one selected file")]
    EmptySelection,

    #[error("invalid setup mode '{0}': expected full, minimal, or custom")]
    InvalidMode(String),

    #[error("invalid policy category '{0}'")]
    InvalidCategory(String),

    #[error("invalid merge strategy '{0}': expected squash, merge, or rebase")]
    InvalidMergeStrategy(String),

    #[error("invalid setup options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MayorError>;
