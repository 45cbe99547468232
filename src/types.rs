use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Opaque ID type for connected clients
pub type ClientId = String;

/// Which ingress a real-time client connected through
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Plain WebSocket listener speaking `{type, data}` frames
    Native,
    /// Named-event socket channel on the HTTP port
    Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientInfo {
    pub id: ClientId,
    pub transport: Transport,
    pub addr: Option<SocketAddr>,
    /// RFC 3339 UTC timestamp
    pub connected_at: String,
}

impl ClientInfo {
    pub fn new(transport: Transport, addr: Option<SocketAddr>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            transport,
            addr,
            connected_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// JSON envelope returned by every HTTP endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse {
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self::message(200, "ok")
    }

    pub fn message(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn data(data: serde_json::Value) -> Self {
        Self {
            code: 200,
            message: None,
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_ids_are_unique() {
        let a = ClientInfo::new(Transport::Native, None);
        let b = ClientInfo::new(Transport::Native, None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_api_response_ok_shape() {
        let value = serde_json::to_value(ApiResponse::ok()).unwrap();
        assert_eq!(value, json!({"code": 200, "message": "ok"}));
    }

    #[test]
    fn test_api_response_data_shape() {
        let value =
            serde_json::to_value(ApiResponse::data(json!({"connectedClients": 3}))).unwrap();
        assert_eq!(value, json!({"code": 200, "data": {"connectedClients": 3}}));
    }
}
