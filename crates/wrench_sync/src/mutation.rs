//! Queued mutation types and their persisted form

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// HTTP verbs a queued mutation may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Only issued for the authoritative read after a conflict
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "patch" => Ok(Method::Patch),
            "delete" => Ok(Method::Delete),
            other => Err(format!("unknown method: {}", other)),
        }
    }
}

/// Synthetic identity of a queued item, stable across re-reads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(String);

impl MutationId {
    pub fn generate() -> Self {
        Self(format!("{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MutationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation data for UI and debugging; never consulted for control flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationMeta {
    pub entity_type: String,
    pub entity_id: String,
}

/// What the transport sees: `{method, url, data}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub url: String,
    #[serde(default)]
    pub data: Value,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            data: Value::Null,
        }
    }
}

/// A pending network action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMutation {
    pub id: MutationId,
    pub method: Method,
    pub url: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MutationMeta>,
}

impl QueuedMutation {
    pub fn new(method: Method, url: impl Into<String>, data: Value) -> Self {
        Self {
            id: MutationId::generate(),
            method,
            url: url.into(),
            data,
            retries: 0,
            next_attempt: None,
            error: None,
            meta: None,
        }
    }

    pub fn with_meta(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.meta = Some(MutationMeta {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        });
        self
    }

    /// True while a backoff delay is still running
    pub fn is_deferred(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt.is_some_and(|at| at > now)
    }

    pub fn request(&self) -> Request {
        Request {
            method: self.method,
            url: self.url.clone(),
            data: self.data.clone(),
        }
    }

    /// One-line description used in logs and drop notices
    pub fn describe(&self) -> String {
        match &self.meta {
            Some(meta) => format!(
                "{} {} ({} {})",
                self.method, self.url, meta.entity_type, meta.entity_id
            ),
            None => format!("{} {}", self.method, self.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    #[test]
    fn test_persisted_shape_uses_camel_case() {
        let mut mutation = QueuedMutation::new(Method::Patch, "/api/assets/7", json!({"name": "Pump"}))
            .with_meta("asset", "7");
        mutation.next_attempt = Some(DateTime::<Utc>::default());

        let value = serde_json::to_value(&mutation).unwrap();
        assert_eq!(value["method"], "patch");
        assert_eq!(value["retries"], 0);
        assert!(value.get("nextAttempt").is_some());
        assert_eq!(value["meta"]["entityType"], "asset");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let raw = r#"{"id":"abc","method":"delete","url":"/api/parts/3"}"#;
        let mutation: QueuedMutation = serde_json::from_str(raw).unwrap();

        assert_eq!(mutation.retries, 0);
        assert_eq!(mutation.data, Value::Null);
        assert!(mutation.next_attempt.is_none());
        assert!(mutation.meta.is_none());
    }

    #[test]
    fn test_is_deferred() {
        let now = DateTime::<Utc>::default();
        let mut mutation = QueuedMutation::new(Method::Post, "/api/assets", json!({}));
        assert!(!mutation.is_deferred(now));

        mutation.next_attempt = Some(now);
        assert!(!mutation.is_deferred(now));

        mutation.next_attempt = Some(now + TimeDelta::seconds(1));
        assert!(mutation.is_deferred(now));
    }

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("PUT".parse::<Method>().unwrap(), Method::Put);
        assert_eq!("delete".parse::<Method>().unwrap(), Method::Delete);
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(MutationId::generate(), MutationId::generate());
    }
}
