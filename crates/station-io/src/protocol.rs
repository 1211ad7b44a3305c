use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const fn v1() -> Self {
        Self { major: 1, minor: 0 }
    }

    pub fn is_supported(&self) -> bool {
        self.major == 1
    }
}

/// Outbound line: one published telemetry envelope.
#[derive(Debug, Serialize)]
pub struct TelemetryMsg {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub protocol_version: ProtocolVersion,
    pub sequence: u64,
    pub unix_us: u64,
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Inbound line: a control command addressed to a unit's command topic.
/// The payload is the plain-text keyword command, untouched; keyword
/// interpretation belongs to the core router.
#[derive(Debug, Deserialize)]
pub struct CommandMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
    pub topic: String,
    pub payload: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HelloMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug)]
pub enum IncomingMessage {
    Hello(HelloMsg),
    Command(CommandMsg),
}

impl IncomingMessage {
    pub fn parse(line: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        let msg_type = value.get("type")?.as_str()?;
        match msg_type {
            "command" => serde_json::from_value(value)
                .ok()
                .map(IncomingMessage::Command),
            "hello" => serde_json::from_value(value)
                .ok()
                .map(IncomingMessage::Hello),
            _ => None,
        }
    }
}
