//! EventContext - per-batch session, request and consent metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConsentState, Payload};

/// Request metadata captured by the inbound layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

/// Context threaded through one processing call
///
/// Created once per batch and shared by reference; nothing downstream mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    pub session_id: String,

    /// Defaults to the time of deserialization
    #[serde(default = "Utc::now")]
    pub session_start: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestMetadata>,

    #[serde(default)]
    pub consent: ConsentState,

    /// Open map for embedding-application data
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub custom: Payload,
}

impl EventContext {
    /// Context for a session starting now
    pub fn new(session_id: impl Into<String>, consent: ConsentState) -> Self {
        Self {
            session_id: session_id.into(),
            session_start: Utc::now(),
            user_id: None,
            anonymous_id: None,
            request: None,
            consent,
            custom: Payload::new(),
        }
    }

    pub fn with_request(mut self, request: RequestMetadata) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_anonymous_id(mut self, anonymous_id: impl Into<String>) -> Self {
        self.anonymous_id = Some(anonymous_id.into());
        self
    }

    pub fn with_custom(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.user_agent.as_deref())
    }

    pub fn ip(&self) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.ip.as_deref())
    }

    pub fn referrer(&self) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.referrer.as_deref())
    }
}
