//! Outbound message model and wire-envelope construction.
//!
//! A logical "send to users/channels" call becomes an
//! `OutboundMessageEnvelope`: one destination per cleaned recipient, and
//! every command button embedded in the message rewritten to a replayable
//! action with a stable generated id.

pub mod client;

use serde::{Deserialize, Serialize};

use crate::core::Parameter;

pub use client::{BoundMessageClient, MessageClient, MessagePayload, MessageSender};

/// Content type tag for rendered Slack messages.
pub const SLACK_CONTENT_TYPE: &str = "application/x-atomist-slack+json";

/// Minimal Slack message shape: text plus attachments that may embed
/// command buttons.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlackMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub attachments: Vec<Attachment>,
}

impl SlackMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub fallback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub actions: Vec<CommandButton>,
}

impl Attachment {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            text: None,
            actions: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_action(mut self, button: CommandButton) -> Self {
        self.actions.push(button);
        self
    }
}

/// A button bound to a command: pressing it replays the command with the
/// given parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandButton {
    pub text: String,
    pub command: String,
    pub parameters: Vec<Parameter>,
}

/// Build a button that invokes `command` with the given parameters.
pub fn button_for_command(
    text: impl Into<String>,
    command: impl Into<String>,
    parameters: Vec<Parameter>,
) -> CommandButton {
    CommandButton {
        text: text.into(),
        command: command.into(),
        parameters,
    }
}

/// Per-send options supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageOptions {
    /// Stable message id, enabling later updates of the same message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Timestamp of a thread to post into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl MessageOptions {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlackAddress {
    pub team: TeamRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamRef {
    pub id: String,
}

/// One addressed recipient of an outbound message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Destination {
    pub user_agent: String,
    pub slack: SlackAddress,
}

impl Destination {
    pub fn user(team_id: &str, user_name: &str) -> Self {
        Self {
            user_agent: "slack".to_string(),
            slack: SlackAddress {
                team: TeamRef {
                    id: team_id.to_string(),
                },
                channel: None,
                user: Some(UserRef {
                    id: None,
                    name: Some(user_name.to_string()),
                }),
                thread_ts: None,
            },
        }
    }

    pub fn channel(team_id: &str, channel_name: &str) -> Self {
        Self {
            user_agent: "slack".to_string(),
            slack: SlackAddress {
                team: TeamRef {
                    id: team_id.to_string(),
                },
                channel: Some(ChannelRef {
                    id: None,
                    name: Some(channel_name.to_string()),
                }),
                user: None,
                thread_ts: None,
            },
        }
    }
}

/// A replayable action carried on the wire envelope. Ids are derived from
/// the bound command name plus a zero-based index, so two identical buttons
/// in one message stay distinguishable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    pub id: String,
    pub command: String,
    pub parameters: Vec<Parameter>,
}

/// The wire form of one outbound message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundMessageEnvelope {
    pub api_version: String,
    pub correlation_id: String,
    pub team: TeamRef,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub destinations: Vec<Destination>,
    pub actions: Vec<Action>,
    /// Rendered message content.
    pub body: serde_json::Value,
}

/// Normalize a recipient list: trim whitespace, drop empty names, and
/// de-duplicate while preserving order.
pub fn clean(names: &[&str]) -> Vec<String> {
    let mut seen = Vec::new();
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.iter().any(|s| s == trimmed) {
            continue;
        }
        seen.push(trimmed.to_string());
    }
    seen
}

/// Assemble the wire envelope for a message: rewrite embedded buttons into
/// indexed actions and attach the rendered body.
pub fn build_envelope(
    message: &SlackMessage,
    correlation_id: &str,
    team_id: &str,
    destinations: Vec<Destination>,
    options: &MessageOptions,
) -> OutboundMessageEnvelope {
    let mut actions = Vec::new();
    for attachment in &message.attachments {
        for button in &attachment.actions {
            let index = actions.len();
            actions.push(Action {
                id: format!("{}-{}", button.command.to_lowercase(), index),
                command: button.command.clone(),
                parameters: button.parameters.clone(),
            });
        }
    }

    OutboundMessageEnvelope {
        api_version: "1".to_string(),
        correlation_id: correlation_id.to_string(),
        team: TeamRef {
            id: team_id.to_string(),
        },
        content_type: SLACK_CONTENT_TYPE.to_string(),
        id: options.id.clone(),
        destinations,
        actions,
        body: serde_json::to_value(message).unwrap_or(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_drops_empty_and_duplicate_names() {
        assert_eq!(clean(&["test"]), vec!["test"]);
        assert_eq!(clean(&[""]).len(), 0);
        assert_eq!(clean(&[" cd ", "cd", "rod"]), vec!["cd", "rod"]);
    }

    #[test]
    fn identical_buttons_get_distinct_indexed_ids() {
        let msg = SlackMessage::text("pick one").with_attachment(
            Attachment::new("pick")
                .with_action(button_for_command("Go", "HelloWorld", vec![]))
                .with_action(button_for_command("Go", "HelloWorld", vec![])),
        );
        let envelope = build_envelope(&msg, "corr", "T1", vec![], &MessageOptions::default());

        assert_eq!(envelope.actions.len(), 2);
        assert_eq!(envelope.actions[0].id, "helloworld-0");
        assert_eq!(envelope.actions[1].id, "helloworld-1");
    }
}
