use serde::{Deserialize, Serialize};

use super::envelope::Incoming;

/// Outcome payload of one handler invocation.
///
/// A zero `code` means success; any other code is treated as a failure
/// indicator even when the handler returned `Ok`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandlerResult {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl HandlerResult {
    pub fn success() -> Self {
        Self {
            code: 0,
            message: None,
            data: None,
        }
    }

    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Terminal outcome of one invocation, paired with its originating envelope.
/// This is what listeners and the event store observe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleResult {
    pub envelope: Incoming,
    pub outcome: LifecycleOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LifecycleOutcome {
    Succeeded { result: HandlerResult },
    Failed { error: String },
}

/// Authentication material handed to a worker exactly once per process
/// lifetime. Graph clients cannot be constructed before this arrives;
/// its absence is a valid (degraded) state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationConfirmation {
    pub jwt: String,
    /// Connection identity assigned by the transport.
    pub name: String,
}

impl RegistrationConfirmation {
    pub fn new(jwt: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            jwt: jwt.into(),
            name: name.into(),
        }
    }
}
