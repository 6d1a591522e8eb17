//! Structural validation of individual events
//!
//! Rules:
//! - timestamp present
//! - userId or anonymousId present and non-empty
//! - track: non-empty name
//! - identify / alias: userId present
//! - group: non-empty groupId
//! - alias: non-empty previousId
//! - consent: properties.action in {granted, revoked, updated}

use contracts::{AnalyticsEvent, EventPayload, EventType};
use serde_json::Value;

use crate::error::ValidationIssue;

/// Validate one event, returning the first rule it breaks
pub fn validate_event(event: &AnalyticsEvent) -> Result<(), ValidationIssue> {
    if event.timestamp.is_none() {
        return Err(ValidationIssue::MissingTimestamp);
    }
    if event.identity().is_none() {
        return Err(ValidationIssue::MissingIdentity);
    }
    validate_payload(event)
}

fn validate_payload(event: &AnalyticsEvent) -> Result<(), ValidationIssue> {
    match &event.payload {
        EventPayload::Track { name, .. } if name.trim().is_empty() => {
            Err(ValidationIssue::EmptyTrackName)
        }
        EventPayload::Identify { .. } => require_user_id(event, EventType::Identify),
        EventPayload::Group { group_id, .. } if group_id.trim().is_empty() => {
            Err(ValidationIssue::MissingGroupId)
        }
        EventPayload::Alias { previous_id } => {
            if previous_id.trim().is_empty() {
                return Err(ValidationIssue::MissingPreviousId);
            }
            require_user_id(event, EventType::Alias)
        }
        EventPayload::Consent { .. } if event.consent_action().is_none() => {
            Err(ValidationIssue::InvalidConsentAction {
                found: describe_action(event),
            })
        }
        EventPayload::Unknown => Err(ValidationIssue::UnknownType),
        _ => Ok(()),
    }
}

fn require_user_id(event: &AnalyticsEvent, event_type: EventType) -> Result<(), ValidationIssue> {
    match event.user_id.as_deref() {
        Some(id) if !id.is_empty() => Ok(()),
        _ => Err(ValidationIssue::MissingUserId { event_type }),
    }
}

fn describe_action(event: &AnalyticsEvent) -> String {
    match &event.payload {
        EventPayload::Consent { properties } => match properties.get("action") {
            Some(Value::String(s)) => format!("'{s}'"),
            Some(other) => other.to_string(),
            None => "nothing".to_string(),
        },
        _ => "nothing".to_string(),
    }
}
