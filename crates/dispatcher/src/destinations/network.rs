//! NetworkDestination - UDP fire-and-forget streaming

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use contracts::{
    AnalyticsEvent, ConsentPurpose, ContractError, Delivery, DestinationMetadata, EventContext,
    EventPayload, EventType, Payload, Settings,
};
use serde::Serialize;
use serde_json::Value;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument};

pub const NETWORK_DESTINATION_TYPE: &str = "network";

const DEFAULT_MAX_PACKET_SIZE: usize = 65000;

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Parsed settings
#[derive(Debug, Clone)]
struct NetworkSettings {
    addr: SocketAddr,
    format: NetworkFormat,
    max_packet_size: usize,
}

impl NetworkSettings {
    fn from_settings(settings: &Settings) -> Result<Self, String> {
        let addr_str = settings
            .get("addr")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing 'addr' setting".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match settings.get("format").and_then(Value::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = settings
            .get("max_packet_size")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_PACKET_SIZE);

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Wire packet; field order is stable so bincode peers can decode it
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Packet<'a> {
    session_id: &'a str,
    event_type: EventType,
    timestamp: Option<DateTime<Utc>>,
    user_id: Option<&'a str>,
    anonymous_id: Option<&'a str>,
    message_id: Option<&'a str>,
    context: &'a Payload,
    payload: &'a EventPayload,
}

impl<'a> Packet<'a> {
    fn new(event: &'a AnalyticsEvent, ctx: &'a EventContext) -> Self {
        Self {
            session_id: &ctx.session_id,
            event_type: event.event_type(),
            timestamp: event.timestamp,
            user_id: event.user_id.as_deref(),
            anonymous_id: event.anonymous_id.as_deref(),
            message_id: event.message_id.as_deref(),
            context: &event.context,
            payload: &event.payload,
        }
    }
}

/// Destination that sends events over UDP
///
/// Settings: `addr` (required), `format` (`json` | `bincode`), `max_packet_size`.
/// Requires measurement consent unless the config overrides it.
#[derive(Debug, Default)]
pub struct NetworkDestination {
    settings: Option<NetworkSettings>,
    socket: Option<UdpSocket>,
}

impl NetworkDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self) -> Option<NetworkFormat> {
        self.settings.as_ref().map(|s| s.format)
    }

    fn serialize_packet(
        &self,
        packet: &Packet<'_>,
        format: NetworkFormat,
    ) -> Result<Vec<u8>, String> {
        match format {
            NetworkFormat::Json => {
                serde_json::to_vec(packet).map_err(|e| format!("json error: {}", e))
            }
            NetworkFormat::Bincode => {
                bincode::serialize(packet).map_err(|e| format!("bincode error: {}", e))
            }
        }
    }

    fn connected(&self) -> Result<(&UdpSocket, &NetworkSettings), ContractError> {
        match (&self.socket, &self.settings) {
            (Some(socket), Some(settings)) => Ok((socket, settings)),
            _ => Err(ContractError::delivery(
                NETWORK_DESTINATION_TYPE,
                "socket not connected",
            )),
        }
    }

    #[instrument(
        name = "network_destination_deliver",
        skip(self, event, ctx),
        fields(event_type = %event.event_type())
    )]
    async fn deliver(
        &self,
        event: &AnalyticsEvent,
        ctx: &EventContext,
    ) -> Result<Delivery, ContractError> {
        let (socket, settings) = self.connected()?;
        let data = self
            .serialize_packet(&Packet::new(event, ctx), settings.format)
            .map_err(|e| ContractError::delivery(NETWORK_DESTINATION_TYPE, e))?;

        if data.len() > settings.max_packet_size {
            return Err(ContractError::delivery(
                NETWORK_DESTINATION_TYPE,
                format!(
                    "packet of {} bytes exceeds max_packet_size {}",
                    data.len(),
                    settings.max_packet_size
                ),
            ));
        }

        let sent = socket.send(&data).await.map_err(|e| {
            error!(error = %e, "UDP send failed");
            ContractError::delivery(NETWORK_DESTINATION_TYPE, e.to_string())
        })?;
        debug!(bytes = sent, "Sent");
        Ok(Delivery::Delivered)
    }
}

forward_event_handlers!(NetworkDestination => deliver {
    fn destination_type(&self) -> &str {
        NETWORK_DESTINATION_TYPE
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn metadata(&self) -> DestinationMetadata {
        DestinationMetadata {
            name: "Network".to_string(),
            description: "Streams events to a UDP collector".to_string(),
            category: Some("streaming".to_string()),
            website: None,
        }
    }

    fn required_consent(&self) -> &[ConsentPurpose] {
        &[ConsentPurpose::Measurement]
    }

    #[instrument(name = "network_destination_initialize", skip(self, settings))]
    async fn initialize(&mut self, settings: &Settings) -> Result<(), ContractError> {
        let parsed = NetworkSettings::from_settings(settings)
            .map_err(|e| ContractError::invalid_settings(NETWORK_DESTINATION_TYPE, e))?;

        // Bind to any available port
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| ContractError::connection(NETWORK_DESTINATION_TYPE, e.to_string()))?;
        socket
            .connect(&parsed.addr)
            .await
            .map_err(|e| ContractError::connection(NETWORK_DESTINATION_TYPE, e.to_string()))?;

        debug!(target_addr = %parsed.addr, format = ?parsed.format, "NetworkDestination connected");
        self.socket = Some(socket);
        self.settings = Some(parsed);
        Ok(())
    }

    async fn test_connection(&self) -> Result<bool, ContractError> {
        Ok(self.socket.is_some())
    }
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::DestinationInstance;
    use contracts::{ConsentState, DestinationConfig, DestinationPlugin};

    fn settings(addr: SocketAddr, format: &str) -> Settings {
        let mut settings = Settings::new();
        settings.insert("addr".into(), addr.to_string().into());
        settings.insert("format".into(), format.into());
        settings
    }

    #[test]
    fn test_network_settings_parsing() {
        let parsed =
            NetworkSettings::from_settings(&settings("127.0.0.1:9999".parse().unwrap(), "bincode"))
                .unwrap();
        assert_eq!(parsed.addr.port(), 9999);
        assert_eq!(parsed.format, NetworkFormat::Bincode);
        assert_eq!(parsed.max_packet_size, DEFAULT_MAX_PACKET_SIZE);

        let mut bad = Settings::new();
        bad.insert("addr".into(), "not-an-addr".into());
        assert!(NetworkSettings::from_settings(&bad).is_err());
        assert!(NetworkSettings::from_settings(&Settings::new()).is_err());
    }

    #[tokio::test]
    async fn test_network_destination_sends_json() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = receiver.local_addr().unwrap();

        let mut destination = NetworkDestination::new();
        destination.initialize(&settings(addr, "json")).await.unwrap();
        assert!(destination.test_connection().await.unwrap());

        let ctx = EventContext::new("s1", ConsentState::all_granted());
        let delivery = destination
            .track(&AnalyticsEvent::track("Signup").with_user_id("u1"), &ctx)
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Delivered);

        let mut buf = vec![0u8; 65536];
        let len = receiver.recv(&mut buf).await.unwrap();
        let packet: Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(packet["sessionId"], "s1");
        assert_eq!(packet["eventType"], "track");
        assert_eq!(packet["payload"]["name"], "Signup");
    }

    #[tokio::test]
    async fn test_network_destination_sends_bincode() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = receiver.local_addr().unwrap();

        let mut destination = NetworkDestination::new();
        destination
            .initialize(&settings(addr, "bincode"))
            .await
            .unwrap();

        let ctx = EventContext::new("s1", ConsentState::all_granted());
        destination
            .page(&AnalyticsEvent::page("home").with_anonymous_id("a1"), &ctx)
            .await
            .unwrap();

        let mut buf = vec![0u8; 65536];
        let len = receiver.recv(&mut buf).await.unwrap();
        // Leading field is the session id as a length-prefixed string
        let session_id: String = bincode::deserialize(&buf[..len]).unwrap();
        assert_eq!(session_id, "s1");
    }

    #[tokio::test]
    async fn test_network_destination_oversized_packet_fails() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut settings = settings(receiver.local_addr().unwrap(), "json");
        settings.insert("max_packet_size".into(), 8.into());

        let mut destination = NetworkDestination::new();
        destination.initialize(&settings).await.unwrap();

        let ctx = EventContext::new("s1", ConsentState::all_granted());
        let err = destination
            .track(&AnalyticsEvent::track("Signup").with_user_id("u1"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::Delivery { .. }));
    }

    #[tokio::test]
    async fn test_network_destination_send_failure_counts_as_error() {
        // Bound then dropped, so nothing listens there
        let closed = UdpSocket::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();

        let mut destination = NetworkDestination::new();
        destination.initialize(&settings(closed, "json")).await.unwrap();
        let instance = DestinationInstance::new(
            Box::new(destination),
            DestinationConfig::new(NETWORK_DESTINATION_TYPE),
        );

        // ICMP port unreachable surfaces on a later send
        let ctx = EventContext::new("s1", ConsentState::all_granted());
        for i in 0..15 {
            let event = AnalyticsEvent::track(format!("e{i}")).with_user_id("u1");
            instance.dispatch_event(&event, &ctx).await;
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let health = instance.health();
        assert!(health.error_count() > 0);
        assert!(health.last_error().is_some());
        assert_eq!(health.events_processed() + health.error_count(), 15);
    }

    #[test]
    fn test_network_destination_requires_measurement() {
        assert_eq!(
            NetworkDestination::new().required_consent(),
            &[ConsentPurpose::Measurement]
        );
    }
}
