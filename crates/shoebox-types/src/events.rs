use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the WebSocket gateway, server -> client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server acknowledges a successful IDENTIFY handshake.
    #[serde(rename = "READY")]
    Ready { user_id: Uuid },

    /// Something changed for this recipient. Deliberately body-less:
    /// clients refetch their listings instead of trusting a pushed payload.
    #[serde(rename = "NEW_MESSAGE")]
    NewMessage,
}

/// Commands sent from client to server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Bind this connection to a user. Until this arrives the connection
    /// receives no events.
    #[serde(rename = "IDENTIFY")]
    Identify { user_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_wire_shape() {
        let json = serde_json::to_string(&GatewayEvent::NewMessage).unwrap();
        assert_eq!(json, r#"{"type":"NEW_MESSAGE"}"#);
    }

    #[test]
    fn identify_parses() {
        let user_id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"IDENTIFY","data":{{"user_id":"{user_id}"}}}}"#);
        let cmd: GatewayCommand = serde_json::from_str(&raw).unwrap();
        let GatewayCommand::Identify { user_id: parsed } = cmd;
        assert_eq!(parsed, user_id);
    }
}
