//! Actuation channel contract and wire format.
//!
//! Outbound traffic is one JSON envelope per motion command; inbound traffic
//! is ready/feedback envelopes that gate each agent's next planning tick.
//! Transport (websocket, serial bridge, in-process queue) lives behind
//! [`ActuationChannel`]; this module only fixes the message shapes.
//!
//! Envelope layout:
//!
//! ```json
//! {
//!   "clientType": "swarm-brain",
//!   "id": "amber",
//!   "messageType": "AgentMovement",
//!   "message": { "angle": 135.0, "timing": 2.4 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use swarmos_types::{MotionCommand, ReadySignal, SwarmError};

pub const CLIENT_TYPE: &str = "swarm-brain";
pub const MSG_MOVEMENT: &str = "AgentMovement";
pub const MSG_READY: &str = "AgentReady";
pub const MSG_FEEDBACK: &str = "AgentFeedback";

/// Transport-side contract: fire one command, await one ready signal.
///
/// Implementations own reconnection and backoff. Sends may fail transiently;
/// the coordinator logs and carries on, so a flaky link never corrupts
/// planning state.
pub trait ActuationChannel: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SwarmError::Channel`] when the command cannot be delivered.
    fn send(&self, command: &MotionCommand) -> Result<(), SwarmError>;

    /// Block until `agent_id`'s robot reports ready for its next command.
    /// Malformed inbound messages are dropped (with a logged reason), never
    /// surfaced as an error.
    ///
    /// # Errors
    ///
    /// Returns [`SwarmError::Channel`] when the link is gone for good.
    fn recv_ready(&self, agent_id: &str) -> Result<ReadySignal, SwarmError>;
}

/// JSON envelope wrapping every message in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEnvelope {
    pub client_type: String,
    pub id: String,
    pub message_type: String,
    pub message: Value,
}

/// Body of an outbound movement envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementBody {
    pub angle: f32,
    pub timing: f32,
}

/// Serialize a motion command into its wire envelope.
pub fn encode_command(command: &MotionCommand) -> Result<String, SwarmError> {
    let envelope = WireEnvelope {
        client_type: CLIENT_TYPE.to_string(),
        id: command.agent_id.clone(),
        message_type: MSG_MOVEMENT.to_string(),
        message: serde_json::to_value(MovementBody {
            angle: command.heading_degrees,
            timing: command.duration_seconds,
        })
        .map_err(|e| SwarmError::Channel(e.to_string()))?,
    };
    serde_json::to_string(&envelope).map_err(|e| SwarmError::Channel(e.to_string()))
}

/// Parse an inbound envelope into a ready signal.
///
/// Both `AgentReady` and `AgentFeedback` gate the next tick; anything else,
/// or an unparseable envelope, is [`SwarmError::MalformedMessage`] so the
/// caller can drop it and keep listening.
pub fn decode_ready(raw: &str) -> Result<ReadySignal, SwarmError> {
    let envelope: WireEnvelope =
        serde_json::from_str(raw).map_err(|e| SwarmError::MalformedMessage(e.to_string()))?;
    match envelope.message_type.as_str() {
        MSG_READY | MSG_FEEDBACK => Ok(ReadySignal::now(envelope.id)),
        other => Err(SwarmError::MalformedMessage(format!(
            "unexpected message type {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_command_carries_angle_and_timing() {
        let cmd = MotionCommand::new("amber", 135.0, 2.4);
        let raw = encode_command(&cmd).unwrap();
        let envelope: WireEnvelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(envelope.client_type, CLIENT_TYPE);
        assert_eq!(envelope.id, "amber");
        assert_eq!(envelope.message_type, MSG_MOVEMENT);
        let body: MovementBody = serde_json::from_value(envelope.message).unwrap();
        assert!((body.angle - 135.0).abs() < 1e-4);
        assert!((body.timing - 2.4).abs() < 1e-4);
    }

    #[test]
    fn ready_and_feedback_both_decode() {
        for msg_type in [MSG_READY, MSG_FEEDBACK] {
            let raw = format!(
                r#"{{"clientType":"robot","id":"teal","messageType":"{msg_type}","message":{{}}}}"#
            );
            let signal = decode_ready(&raw).unwrap();
            assert_eq!(signal.agent_id, "teal");
        }
    }

    #[test]
    fn garbage_is_malformed_not_fatal() {
        let err = decode_ready("not json at all");
        assert!(matches!(err, Err(SwarmError::MalformedMessage(_))));
    }

    #[test]
    fn unknown_message_type_is_malformed() {
        let raw = r#"{"clientType":"robot","id":"teal","messageType":"Telemetry","message":{}}"#;
        let err = decode_ready(raw);
        assert!(matches!(err, Err(SwarmError::MalformedMessage(_))));
    }
}
