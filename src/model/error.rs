//! Query error taxonomy
//!
//! Every verb on every adapter fails with a [`QueryError`] of one of three
//! kinds. Callers branch on [`ErrorKind`], never on the message text.

use std::fmt;

/// Closed set of query failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The requested key does not exist upstream
    NotFound,
    /// The adapter does not serve the requested scope
    NoScope,
    /// Transport, auth, malformed query or unexpected provider errors
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "NOTFOUND",
            ErrorKind::NoScope => "NOSCOPE",
            ErrorKind::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// Error returned by Get/List/Search
///
/// Cloneable so every single-flight waiter can receive the leader's error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize)]
#[error("{kind}: {message}")]
pub struct QueryError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
}

impl QueryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            scope: None,
            item_type: None,
            source_name: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn no_scope(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoScope, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }

    /// Wrap a provider/transport error as `OTHER`, keeping the whole context chain
    pub fn from_provider(err: &anyhow::Error) -> Self {
        Self::other(format!("{:#}", err))
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    /// Fill in the context fields that are still empty
    pub fn in_context(mut self, source_name: &str, item_type: &str, scope: &str) -> Self {
        self.source_name.get_or_insert_with(|| source_name.to_string());
        self.item_type.get_or_insert_with(|| item_type.to_string());
        self.scope.get_or_insert_with(|| scope.to_string());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
