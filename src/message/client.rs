//! Message client: the outbound-message capability handed to handlers
//! through their execution context.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{AutomationError, Incoming, Result};

use super::{
    Destination, MessageOptions, OutboundMessageEnvelope, SlackMessage, build_envelope, clean,
};

/// Logical send request, as forwarded over worker IPC before the coordinator
/// turns it into a wire envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message: SlackMessage,
    pub user_names: Vec<String>,
    pub channel_names: Vec<String>,
    pub options: MessageOptions,
}

/// Transport-specific delivery of a constructed message. Implementations
/// must not block on delivery acknowledgement.
pub trait MessageSender: Send + Sync {
    fn send(
        &self,
        origin: &Incoming,
        envelope: &OutboundMessageEnvelope,
        payload: &MessagePayload,
    ) -> Result<()>;
}

/// Outbound messaging operations available to handler logic.
#[async_trait]
pub trait MessageClient: Send + Sync {
    /// Send a message to the named users in the given team.
    async fn address_users(
        &self,
        message: &SlackMessage,
        team_id: &str,
        user_names: &[&str],
        options: &MessageOptions,
    ) -> Result<OutboundMessageEnvelope>;

    /// Send a message to the named channels in the given team.
    async fn address_channels(
        &self,
        message: &SlackMessage,
        team_id: &str,
        channel_names: &[&str],
        options: &MessageOptions,
    ) -> Result<OutboundMessageEnvelope>;

    /// Reply to the message that triggered this invocation. Only valid for
    /// command invocations that carried an originating-message context.
    async fn respond(
        &self,
        message: &SlackMessage,
        options: &MessageOptions,
    ) -> Result<OutboundMessageEnvelope>;
}

/// Message client bound to one inbound envelope, so every send carries the
/// right correlation id, team and (for `respond`) reply address.
pub struct BoundMessageClient {
    envelope: Incoming,
    sender: Arc<dyn MessageSender>,
}

impl BoundMessageClient {
    pub fn new(envelope: Incoming, sender: Arc<dyn MessageSender>) -> Self {
        Self { envelope, sender }
    }

    fn deliver(
        &self,
        envelope: OutboundMessageEnvelope,
        payload: MessagePayload,
    ) -> Result<OutboundMessageEnvelope> {
        self.sender.send(&self.envelope, &envelope, &payload)?;
        Ok(envelope)
    }
}

#[async_trait]
impl MessageClient for BoundMessageClient {
    async fn address_users(
        &self,
        message: &SlackMessage,
        team_id: &str,
        user_names: &[&str],
        options: &MessageOptions,
    ) -> Result<OutboundMessageEnvelope> {
        let names = clean(user_names);
        let destinations = names
            .iter()
            .map(|name| Destination::user(team_id, name))
            .collect();
        let envelope = build_envelope(
            message,
            self.envelope.correlation_id(),
            team_id,
            destinations,
            options,
        );
        self.deliver(
            envelope,
            MessagePayload {
                message: message.clone(),
                user_names: names,
                channel_names: Vec::new(),
                options: options.clone(),
            },
        )
    }

    async fn address_channels(
        &self,
        message: &SlackMessage,
        team_id: &str,
        channel_names: &[&str],
        options: &MessageOptions,
    ) -> Result<OutboundMessageEnvelope> {
        let names = clean(channel_names);
        let destinations = names
            .iter()
            .map(|name| Destination::channel(team_id, name))
            .collect();
        let envelope = build_envelope(
            message,
            self.envelope.correlation_id(),
            team_id,
            destinations,
            options,
        );
        self.deliver(
            envelope,
            MessagePayload {
                message: message.clone(),
                user_names: Vec::new(),
                channel_names: names,
                options: options.clone(),
            },
        )
    }

    async fn respond(
        &self,
        message: &SlackMessage,
        options: &MessageOptions,
    ) -> Result<OutboundMessageEnvelope> {
        let source = match &self.envelope {
            Incoming::Command(command) => command
                .source
                .as_ref()
                .ok_or(AutomationError::RespondNotSupported)?,
            Incoming::Event(_) => return Err(AutomationError::RespondNotSupported),
        };

        let (channel, user) = match (&source.channel_id, &source.user_id) {
            (Some(channel_id), _) => (
                Some(super::ChannelRef {
                    id: Some(channel_id.clone()),
                    name: None,
                }),
                None,
            ),
            (None, Some(user_id)) => (
                None,
                Some(super::UserRef {
                    id: Some(user_id.clone()),
                    name: None,
                }),
            ),
            (None, None) => return Err(AutomationError::RespondNotSupported),
        };
        let destination = Destination {
            user_agent: "slack".to_string(),
            slack: super::SlackAddress {
                team: super::TeamRef {
                    id: source.team_id.clone(),
                },
                channel,
                user,
                thread_ts: source.thread_ts.clone(),
            },
        };

        let envelope = build_envelope(
            message,
            self.envelope.correlation_id(),
            self.envelope.team_id(),
            vec![destination],
            options,
        );
        self.deliver(
            envelope,
            MessagePayload {
                message: message.clone(),
                user_names: Vec::new(),
                channel_names: Vec::new(),
                options: options.clone(),
            },
        )
    }
}
