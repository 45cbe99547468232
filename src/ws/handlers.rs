//! Frame dispatch for both real-time transports.
//!
//! Raw text is parsed into a [`ClientEvent`] here, then routed according to
//! the transport it arrived on. Anything returned is a reply for the sender
//! only; broadcasts go straight through the relay.

use crate::protocol::{ClientEvent, ClientFrame, Event};
use crate::relay::Relay;
use crate::types::Transport;

/// Parse one text frame and handle it. Malformed JSON is logged and dropped.
pub async fn handle_text(
    text: &str,
    transport: Transport,
    client_id: &str,
    relay: &Relay,
) -> Option<Event> {
    match ClientFrame::parse(text) {
        Ok(frame) => handle_message(frame.into(), transport, client_id, relay).await,
        Err(e) => {
            tracing::warn!("Failed to parse client frame from {}: {}", client_id, e);
            None
        }
    }
}

pub async fn handle_message(
    event: ClientEvent,
    transport: Transport,
    client_id: &str,
    relay: &Relay,
) -> Option<Event> {
    match transport {
        Transport::Native => handle_native(event, relay).await,
        Transport::Channel => handle_channel(event, client_id, relay).await,
    }
}

/// Plain WebSocket ingress: only steps are relayed, re-typed as `newStep`
async fn handle_native(event: ClientEvent, relay: &Relay) -> Option<Event> {
    match event {
        ClientEvent::Step(data) => {
            tracing::info!("Step received: {:?}", data.get("action"));
            relay.broadcast(&Event::NewStep(data), None).await;
        }
        other => {
            tracing::debug!("Ignoring frame on native socket: {:?}", other);
        }
    }
    None
}

async fn handle_channel(event: ClientEvent, client_id: &str, relay: &Relay) -> Option<Event> {
    match event {
        ClientEvent::Step(data) => {
            tracing::info!("Step received: {:?}", data.get("action"));
            relay.broadcast(&Event::NewStep(data), None).await;
            None
        }
        ClientEvent::StartRecording => {
            tracing::info!("Recording started by {}", client_id);
            relay.broadcast(&Event::recording(true), None).await;
            None
        }
        ClientEvent::StopRecording => {
            tracing::info!("Recording stopped by {}", client_id);
            relay.broadcast(&Event::recording(false), None).await;
            None
        }
        ClientEvent::Ping => Some(Event::Pong),
        ClientEvent::Unknown(kind) => {
            tracing::debug!("Ignoring unknown channel event {:?} from {}", kind, client_id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ClientHandle, ClientRegistry, Outbound};
    use crate::types::ClientInfo;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    async fn connect(relay: &Relay, transport: Transport) -> (String, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(16);
        let info = ClientInfo::new(transport, None);
        let id = info.id.clone();
        relay.registry().register(ClientHandle::new(info, tx)).await;
        (id, rx)
    }

    fn next(rx: &mut mpsc::Receiver<Outbound>) -> Option<Value> {
        rx.try_recv().ok().map(|m| serde_json::from_str(&m).unwrap())
    }

    #[tokio::test]
    async fn test_native_step_is_rebroadcast_as_new_step_to_all() {
        let relay = Relay::new(ClientRegistry::new());
        let (a, mut rx_a) = connect(&relay, Transport::Native).await;
        let (_b, mut rx_b) = connect(&relay, Transport::Native).await;

        let reply = handle_text(
            r#"{"type":"step","data":{"action":"click"}}"#,
            Transport::Native,
            &a,
            &relay,
        )
        .await;

        assert!(reply.is_none());
        let expected = json!({"type": "newStep", "data": {"action": "click"}});
        assert_eq!(next(&mut rx_a), Some(expected.clone()));
        assert_eq!(next(&mut rx_b), Some(expected));
    }

    #[tokio::test]
    async fn test_native_ignores_other_frames() {
        let relay = Relay::new(ClientRegistry::new());
        let (a, mut rx_a) = connect(&relay, Transport::Native).await;

        for frame in [
            r#"{"type":"ping"}"#,
            r#"{"type":"startRecording"}"#,
            r#"{"type":"whatever","data":1}"#,
        ] {
            assert!(handle_text(frame, Transport::Native, &a, &relay).await.is_none());
        }
        assert_eq!(next(&mut rx_a), None);
    }

    #[tokio::test]
    async fn test_malformed_json_keeps_client_registered() {
        let relay = Relay::new(ClientRegistry::new());
        let (a, mut rx_a) = connect(&relay, Transport::Native).await;

        assert!(handle_text("{oops", Transport::Native, &a, &relay).await.is_none());
        assert_eq!(relay.registry().len().await, 1);

        handle_text(r#"{"type":"step","data":{"n":1}}"#, Transport::Native, &a, &relay).await;
        assert_eq!(next(&mut rx_a).unwrap()["data"], json!({"n": 1}));
    }

    #[tokio::test]
    async fn test_channel_ping_replies_to_sender_only() {
        let relay = Relay::new(ClientRegistry::new());
        let (a, mut rx_a) = connect(&relay, Transport::Channel).await;
        let (_b, mut rx_b) = connect(&relay, Transport::Channel).await;

        let reply = handle_message(ClientEvent::Ping, Transport::Channel, &a, &relay).await;
        assert_eq!(reply, Some(Event::Pong));
        assert_eq!(next(&mut rx_a), None);
        assert_eq!(next(&mut rx_b), None);
    }

    #[tokio::test]
    async fn test_channel_recording_toggles_broadcast_fixed_status() {
        let relay = Relay::new(ClientRegistry::new());
        let (a, mut rx_a) = connect(&relay, Transport::Channel).await;
        let (_b, mut rx_b) = connect(&relay, Transport::Native).await;

        handle_message(ClientEvent::StartRecording, Transport::Channel, &a, &relay).await;
        handle_message(ClientEvent::StopRecording, Transport::Channel, &a, &relay).await;

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(
                next(rx),
                Some(json!({"type": "recordingStatus", "data": {"recording": true, "paused": false}}))
            );
            assert_eq!(
                next(rx),
                Some(json!({"type": "recordingStatus", "data": {"recording": false, "paused": false}}))
            );
        }
    }

    #[tokio::test]
    async fn test_channel_step_includes_sender() {
        let relay = Relay::new(ClientRegistry::new());
        let (a, mut rx_a) = connect(&relay, Transport::Channel).await;

        let data = json!({"action": "input", "selector": "#q", "value": "rust"});
        handle_message(ClientEvent::Step(data.clone()), Transport::Channel, &a, &relay).await;

        assert_eq!(next(&mut rx_a), Some(json!({"type": "newStep", "data": data})));
    }
}
