//! AnalyticsEvent - the tagged event record routed to destinations
//!
//! Wire shape follows the consent platform's camelCase JSON:
//!
//! ```json
//! { "type": "track", "timestamp": "2024-01-01T00:00:00Z", "userId": "u1",
//!   "name": "Checkout", "properties": { "total": 42 } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Free-form JSON object used for properties, traits and context
pub type Payload = Map<String, Value>;

/// A single analytics occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    /// Event time; required, enforced by the processor's validation stage
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymous_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Caller-supplied context; enrichment merges session/request data in here
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Payload,

    /// Variant-specific payload, tagged by `type`
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Variant payloads keyed by the `type` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum EventPayload {
    Track {
        #[serde(default)]
        name: String,
        #[serde(default)]
        properties: Payload,
    },
    Page {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        #[serde(default)]
        properties: Payload,
    },
    Identify {
        #[serde(default)]
        traits: Payload,
    },
    Group {
        #[serde(default)]
        group_id: String,
        #[serde(default)]
        traits: Payload,
    },
    Alias {
        #[serde(default)]
        previous_id: String,
    },
    Consent {
        #[serde(default)]
        properties: Payload,
    },
    /// Any type tag this version does not know
    #[serde(other)]
    Unknown,
}

/// Bare event type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Track,
    Page,
    Identify,
    Group,
    Alias,
    Consent,
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Page => "page",
            Self::Identify => "identify",
            Self::Group => "group",
            Self::Alias => "alias",
            Self::Consent => "consent",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action carried by a `consent` event in `properties.action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentAction {
    Granted,
    Revoked,
    Updated,
}

impl ConsentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Revoked => "revoked",
            Self::Updated => "updated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "granted" => Some(Self::Granted),
            "revoked" => Some(Self::Revoked),
            "updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

impl AnalyticsEvent {
    /// New event stamped with the current time and no identity
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            user_id: None,
            anonymous_id: None,
            session_id: None,
            message_id: None,
            context: Payload::new(),
            payload,
        }
    }

    pub fn track(name: impl Into<String>) -> Self {
        Self::new(EventPayload::Track {
            name: name.into(),
            properties: Payload::new(),
        })
    }

    pub fn page(name: impl Into<String>) -> Self {
        Self::new(EventPayload::Page {
            name: Some(name.into()),
            category: None,
            properties: Payload::new(),
        })
    }

    pub fn identify(user_id: impl Into<String>) -> Self {
        Self::new(EventPayload::Identify {
            traits: Payload::new(),
        })
        .with_user_id(user_id)
    }

    pub fn group(group_id: impl Into<String>) -> Self {
        Self::new(EventPayload::Group {
            group_id: group_id.into(),
            traits: Payload::new(),
        })
    }

    pub fn alias(previous_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(EventPayload::Alias {
            previous_id: previous_id.into(),
        })
        .with_user_id(user_id)
    }

    pub fn consent(action: ConsentAction) -> Self {
        let mut properties = Payload::new();
        properties.insert("action".into(), Value::from(action.as_str()));
        Self::new(EventPayload::Consent { properties })
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_anonymous_id(mut self, anonymous_id: impl Into<String>) -> Self {
        self.anonymous_id = Some(anonymous_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Insert into `properties` (track/page/consent) or `traits` (identify/group).
    /// No-op for variants without a map.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some(map) = self.payload.fields_mut() {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn is_consent(&self) -> bool {
        matches!(self.payload, EventPayload::Consent { .. })
    }

    /// User id if present, else anonymous id
    pub fn identity(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .or(self.anonymous_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Parsed `properties.action` of a consent event
    pub fn consent_action(&self) -> Option<ConsentAction> {
        match &self.payload {
            EventPayload::Consent { properties } => properties
                .get("action")
                .and_then(Value::as_str)
                .and_then(ConsentAction::parse),
            _ => None,
        }
    }
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Track { .. } => EventType::Track,
            Self::Page { .. } => EventType::Page,
            Self::Identify { .. } => EventType::Identify,
            Self::Group { .. } => EventType::Group,
            Self::Alias { .. } => EventType::Alias,
            Self::Consent { .. } => EventType::Consent,
            Self::Unknown => EventType::Unknown,
        }
    }

    fn fields_mut(&mut self) -> Option<&mut Payload> {
        match self {
            Self::Track { properties, .. }
            | Self::Page { properties, .. }
            | Self::Consent { properties } => Some(properties),
            Self::Identify { traits } | Self::Group { traits, .. } => Some(traits),
            Self::Alias { .. } | Self::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_track() {
        let event: AnalyticsEvent = serde_json::from_value(json!({
            "type": "track",
            "timestamp": "2024-03-01T12:00:00Z",
            "anonymousId": "anon-1",
            "name": "Signup",
            "properties": { "plan": "pro" }
        }))
        .unwrap();

        assert_eq!(event.event_type(), EventType::Track);
        assert_eq!(event.identity(), Some("anon-1"));
        match event.payload {
            EventPayload::Track { name, properties } => {
                assert_eq!(name, "Signup");
                assert_eq!(properties["plan"], "pro");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_tag() {
        let event: AnalyticsEvent = serde_json::from_value(json!({
            "type": "screen",
            "timestamp": "2024-03-01T12:00:00Z",
            "userId": "u1"
        }))
        .unwrap();
        assert_eq!(event.event_type(), EventType::Unknown);
    }

    #[test]
    fn test_group_uses_camel_case_fields() {
        let event = AnalyticsEvent::group("acme").with_user_id("u1");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "group");
        assert_eq!(value["groupId"], "acme");
        assert_eq!(value["userId"], "u1");
    }

    #[test]
    fn test_consent_action() {
        let event = AnalyticsEvent::consent(ConsentAction::Revoked);
        assert!(event.is_consent());
        assert_eq!(event.consent_action(), Some(ConsentAction::Revoked));

        let bogus =
            AnalyticsEvent::consent(ConsentAction::Granted).with_property("action", "maybe");
        assert_eq!(bogus.consent_action(), None);
    }

    #[test]
    fn test_missing_timestamp_is_none() {
        let event: AnalyticsEvent = serde_json::from_value(json!({
            "type": "page",
            "userId": "u1"
        }))
        .unwrap();
        assert!(event.timestamp.is_none());
    }
}
