use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Events pushed to connected clients.
///
/// Serialized as `{"type": "...", "data": ...}`; `pong` carries no data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Event {
    NewStep(Value),
    RecordingStatus(Value),
    Status(StatusPayload),
    Pong,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusPayload {
    pub connected: bool,
    pub clients: usize,
}

impl Event {
    /// Fixed status broadcast for the recording toggles
    pub fn recording(recording: bool) -> Self {
        Event::RecordingStatus(json!({ "recording": recording, "paused": false }))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::NewStep(_) => "newStep",
            Event::RecordingStatus(_) => "recordingStatus",
            Event::Status(_) => "status",
            Event::Pong => "pong",
        }
    }
}

/// Raw inbound frame as sent by the extension and viewers.
///
/// Only the `type` discriminator is interpreted; `data` stays opaque.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Inbound events understood by the ingress adapters
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Step(Value),
    StartRecording,
    StopRecording,
    Ping,
    /// Anything else, kept for logging
    Unknown(Option<String>),
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl From<ClientFrame> for ClientEvent {
    fn from(frame: ClientFrame) -> Self {
        match frame.kind.as_deref() {
            Some("step") => ClientEvent::Step(frame.data.unwrap_or_else(|| json!({}))),
            Some("startRecording") => ClientEvent::StartRecording,
            Some("stopRecording") => ClientEvent::StopRecording,
            Some("ping") => ClientEvent::Ping,
            _ => ClientEvent::Unknown(frame.kind),
        }
    }
}
