//! Tagged IPC messages exchanged between the coordinator and its workers.
//!
//! Everything here is serde-serializable so the same shapes work over an
//! in-process channel or a real OS-process boundary.

use serde::{Deserialize, Serialize};

use crate::core::{
    CommandEnvelope, EventEnvelope, HandlerResult, Incoming, RegistrationConfirmation,
};
use crate::dispatch::ClsContext;
use crate::message::MessagePayload;

/// Coordinator -> worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerInbound {
    Registration { data: RegistrationConfirmation },
    Command { data: CommandEnvelope },
    Event { data: EventEnvelope },
}

/// Worker -> coordinator. Every message carries the ambient correlation and
/// team values captured at send time, so the coordinator can re-attach them
/// when forwarding to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerOutbound {
    Status {
        cls: ClsContext,
        data: serde_json::Value,
    },
    Message {
        event: Incoming,
        cls: ClsContext,
        data: MessagePayload,
    },
    CommandSuccess {
        event: CommandEnvelope,
        cls: ClsContext,
        data: HandlerResult,
    },
    CommandFailure {
        event: CommandEnvelope,
        cls: ClsContext,
        data: String,
    },
    EventSuccess {
        event: EventEnvelope,
        cls: ClsContext,
        data: Vec<HandlerResult>,
    },
    EventFailure {
        event: EventEnvelope,
        cls: ClsContext,
        data: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_frames_are_tagged_with_snake_case_kinds() {
        let frame = WorkerOutbound::CommandSuccess {
            event: CommandEnvelope::new("HelloWorld", "T1"),
            cls: ClsContext::default(),
            data: HandlerResult::success(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "command_success");
    }

    #[test]
    fn inbound_frames_round_trip() {
        let frame = WorkerInbound::Registration {
            data: RegistrationConfirmation::new("jwt", "conn-1"),
        };
        let json = serde_json::to_string(&frame).unwrap();
        let back: WorkerInbound = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, WorkerInbound::Registration { .. }));
    }
}
