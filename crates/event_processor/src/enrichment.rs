//! Context enrichment
//!
//! Produces a new event whose `context` carries the batch's session and request
//! data. Caller-set context keys outside the session/request block survive.

use chrono::SecondsFormat;
use contracts::{AnalyticsEvent, EventContext};
use serde_json::Value;

/// Context keys owned by enrichment
pub const SESSION_ID_KEY: &str = "sessionId";
pub const SESSION_START_KEY: &str = "sessionStart";
pub const USER_AGENT_KEY: &str = "userAgent";
pub const IP_KEY: &str = "ip";
pub const REFERRER_KEY: &str = "referrer";

/// Return an enriched copy of `event`
pub fn enrich_event(event: &AnalyticsEvent, ctx: &EventContext) -> AnalyticsEvent {
    let mut enriched = event.clone();

    let context = &mut enriched.context;
    context.insert(SESSION_ID_KEY.into(), Value::from(ctx.session_id.as_str()));
    context.insert(
        SESSION_START_KEY.into(),
        Value::from(ctx.session_start.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    let request_fields = [
        (USER_AGENT_KEY, ctx.user_agent()),
        (IP_KEY, ctx.ip()),
        (REFERRER_KEY, ctx.referrer()),
    ];
    for (key, value) in request_fields {
        if let Some(value) = value {
            context.insert(key.into(), Value::from(value));
        }
    }

    for (key, value) in &ctx.custom {
        context.entry(key.clone()).or_insert_with(|| value.clone());
    }

    if enriched.session_id.is_none() {
        enriched.session_id = Some(ctx.session_id.clone());
    }

    enriched
}
