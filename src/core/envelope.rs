use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One supplied command parameter: a `(name, value)` pair. Parameter values
/// always travel as strings; declared specs narrow what is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A supplied secret value, addressed by its declared path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Secret {
    pub uri: String,
    pub value: String,
}

/// Workspace identity the envelope belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Team {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// Slack address of the message that triggered a command. Present only on
/// command envelopes; its presence is what makes `respond` legal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageSource {
    pub user_agent: String,
    pub team_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl MessageSource {
    pub fn channel(team_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            user_agent: "slack".to_string(),
            team_id: team_id.into(),
            channel_id: Some(channel_id.into()),
            user_id: None,
            thread_ts: None,
        }
    }

    pub fn user(team_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            user_agent: "slack".to_string(),
            team_id: team_id.into(),
            channel_id: None,
            user_id: Some(user_id.into()),
            thread_ts: None,
        }
    }

    pub fn with_thread_ts(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }
}

/// A complete inbound command envelope.
///
/// The correlation id is assigned once (at construction or by the transport)
/// and never reused across invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub api_version: String,
    /// Unique id tying together all side effects of this invocation.
    pub correlation_id: String,
    pub team: Team,
    /// Name of the command handler to invoke.
    pub command: String,
    /// Ordered parameter values as supplied by the caller.
    pub parameters: Vec<Parameter>,
    pub mapped_parameters: Vec<Parameter>,
    pub secrets: Vec<Secret>,
    /// Originating message context; required for `respond` to work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<MessageSource>,
    pub received_at: DateTime<Utc>,
}

impl CommandEnvelope {
    /// Creates a new command envelope with a fresh correlation id.
    pub fn new(command: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            api_version: "1".to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            team: Team::new(team_id),
            command: command.into(),
            parameters: Vec::new(),
            mapped_parameters: Vec::new(),
            secrets: Vec::new(),
            source: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(name, value));
        self
    }

    pub fn with_mapped_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.mapped_parameters.push(Parameter::new(name, value));
        self
    }

    pub fn with_secret(mut self, uri: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.push(Secret {
            uri: uri.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_source(mut self, source: MessageSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// A complete inbound event envelope.
///
/// Events never carry an originating message, so there is nothing to
/// `respond` to; that restriction is enforced by the message client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Subscription/operation name this payload matched.
    pub operation_name: String,
    pub team_id: String,
    pub correlation_id: String,
    /// Structured subscription payload.
    pub payload: serde_json::Value,
    pub secrets: Vec<Secret>,
    pub received_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(
        operation_name: impl Into<String>,
        team_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            team_id: team_id.into(),
            correlation_id: Uuid::new_v4().to_string(),
            payload,
            secrets: Vec::new(),
            received_at: Utc::now(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_secret(mut self, uri: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.push(Secret {
            uri: uri.into(),
            value: value.into(),
        });
        self
    }
}

/// Either kind of inbound envelope, for code paths that accept both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Incoming {
    Command(CommandEnvelope),
    Event(EventEnvelope),
}

impl Incoming {
    pub fn correlation_id(&self) -> &str {
        match self {
            Incoming::Command(c) => &c.correlation_id,
            Incoming::Event(e) => &e.correlation_id,
        }
    }

    pub fn team_id(&self) -> &str {
        match self {
            Incoming::Command(c) => &c.team.id,
            Incoming::Event(e) => &e.team_id,
        }
    }

    /// Handler name (command) or subscription name (event).
    pub fn operation(&self) -> &str {
        match self {
            Incoming::Command(c) => &c.command,
            Incoming::Event(e) => &e.operation_name,
        }
    }
}
