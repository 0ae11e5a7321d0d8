//! Network transport port

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::mutation::Request;

/// HTTP status signalling a stale base version
pub const CONFLICT_STATUS: u16 = 409;

/// Failure reported by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// `None` when the request never produced a response (DNS, refused, timeout)
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "network error: {}", self.message),
        }
    }
}

impl std::error::Error for TransportError {}

/// Executes `{method, url, data}` against the server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the response body on success
    async fn execute(&self, request: &Request) -> Result<Value, TransportError>;

    /// Whether `error` means the server holds a newer version than the mutation assumed
    fn is_conflict(&self, error: &TransportError) -> bool {
        error.status == Some(CONFLICT_STATUS)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: &Request) -> Result<Value, TransportError> {
        (**self).execute(request).await
    }

    fn is_conflict(&self, error: &TransportError) -> bool {
        (**self).is_conflict(error)
    }
}
