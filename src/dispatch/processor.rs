//! The dispatcher core: resolve, hydrate, execute, notify, report.
//!
//! One envelope moves through `Received -> Resolved -> Hydrated ->
//! Executing -> {Succeeded | Failed}`. Exactly one of the two completion
//! callbacks fires exactly once per envelope; listener notification always
//! happens before the callback, and every failure is logged with the
//! envelope's correlation id and handler name first.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error, info};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::core::{
    AutomationError, CommandEnvelope, EventEnvelope, HandlerResult, Incoming, Result,
};
use crate::graph::GraphClientCache;
use crate::listener::{AutomationEventListener, ListenerBus};
use crate::message::{BoundMessageClient, MessageSender};
use crate::registry::HandlerRegistry;

use super::context::{ClsContext, ExecutionContext, cls};
use super::hydrate::{hydrate_command, hydrate_event};

/// Success/failure callback pair supplied by the transport.
///
/// Both callbacks are `FnOnce` and the pair is consumed by whichever side
/// fires, so "exactly one fires exactly once" holds by construction.
pub struct Completion {
    on_success: Box<dyn FnOnce(HandlerResult) + Send>,
    on_failure: Box<dyn FnOnce(AutomationError) + Send>,
}

impl Completion {
    pub fn new(
        on_success: impl FnOnce(HandlerResult) + Send + 'static,
        on_failure: impl FnOnce(AutomationError) + Send + 'static,
    ) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        }
    }

    /// A completion that only logs, for callers that do not care.
    pub fn logging() -> Self {
        Self::new(
            |result| debug!("Invocation succeeded with code {}", result.code),
            |err| debug!("Invocation failed: {err}"),
        )
    }

    fn succeed(self, result: HandlerResult) {
        (self.on_success)(result);
    }

    fn fail(self, err: AutomationError) {
        (self.on_failure)(err);
    }
}

/// The request-processing core. One instance per worker; safe to share
/// behind `Arc` because the registry is read-only and the graph cache is
/// internally synchronized.
pub struct RequestProcessor {
    registry: Arc<HandlerRegistry>,
    graph_cache: Arc<GraphClientCache>,
    sender: Arc<dyn MessageSender>,
    listeners: ListenerBus,
}

impl RequestProcessor {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        graph_cache: Arc<GraphClientCache>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            registry,
            graph_cache,
            sender,
            listeners: ListenerBus::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn AutomationEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn graph_cache(&self) -> &Arc<GraphClientCache> {
        &self.graph_cache
    }

    /// Dispatch one command envelope. Exactly one completion callback fires.
    pub async fn process_command(&self, mut envelope: CommandEnvelope, completion: Completion) {
        // Assign the correlation id up front so failure logs, listeners and
        // outbound sends all carry the same value.
        if envelope.correlation_id.is_empty() {
            envelope.correlation_id = Uuid::new_v4().to_string();
        }
        info!(
            "Incoming command '{}' for team '{}' ({})",
            envelope.command, envelope.team.id, envelope.correlation_id
        );

        // Resolved
        let Some(descriptor) = self.registry.resolve_command(&envelope.command) else {
            let err = AutomationError::HandlerNotFound(envelope.command.clone());
            error!(
                "Dispatch of '{}' failed ({}): {err}",
                envelope.command, envelope.correlation_id
            );
            self.listeners.command_failed(&envelope, &err.to_string());
            completion.fail(err);
            return;
        };

        // Hydrated
        let registration = self.graph_cache.registration();
        let hydrated = match hydrate_command(descriptor, &envelope, registration.as_ref()) {
            Ok(hydrated) => hydrated,
            Err(err) => {
                error!(
                    "Dispatch of '{}' failed ({}): {err}",
                    envelope.command, envelope.correlation_id
                );
                self.listeners.command_failed(&envelope, &err.to_string());
                completion.fail(err);
                return;
            }
        };
        let (invocation, secrets) = hydrated;

        // Executing
        let ctx = self.execution_context(Incoming::Command(envelope.clone()), secrets);
        self.listeners.command_starting(&envelope);

        let handler = Arc::clone(&descriptor.handler);
        let cls_ctx = ctx.cls();
        let span = info_span!("command", command = %envelope.command,
            correlation_id = %envelope.correlation_id);
        let outcome = run_handler(cls_ctx, async move {
            handler.handle(&ctx, &invocation).await
        })
        .instrument(span)
        .await;

        match outcome {
            Ok(result) if result.is_success() => {
                debug!(
                    "Command '{}' succeeded ({})",
                    envelope.command, envelope.correlation_id
                );
                self.listeners.command_successful(&envelope, &result);
                completion.succeed(result);
            }
            Ok(result) => {
                let err = AutomationError::HandlerExecution(
                    result
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("handler returned code {}", result.code)),
                );
                error!(
                    "Command '{}' failed ({}): {err}",
                    envelope.command, envelope.correlation_id
                );
                self.listeners.command_failed(&envelope, &err.to_string());
                completion.fail(err);
            }
            Err(err) => {
                error!(
                    "Command '{}' failed ({}): {err}",
                    envelope.command, envelope.correlation_id
                );
                self.listeners.command_failed(&envelope, &err.to_string());
                completion.fail(err);
            }
        }
    }

    /// Dispatch one event envelope. Exactly one completion callback fires.
    pub async fn process_event(&self, mut envelope: EventEnvelope, completion: Completion) {
        if envelope.correlation_id.is_empty() {
            envelope.correlation_id = Uuid::new_v4().to_string();
        }
        info!(
            "Incoming event '{}' for team '{}' ({})",
            envelope.operation_name, envelope.team_id, envelope.correlation_id
        );

        let Some(descriptor) = self.registry.resolve_event(&envelope.operation_name) else {
            let err = AutomationError::HandlerNotFound(envelope.operation_name.clone());
            error!(
                "Dispatch of '{}' failed ({}): {err}",
                envelope.operation_name, envelope.correlation_id
            );
            self.listeners.event_failed(&envelope, &err.to_string());
            completion.fail(err);
            return;
        };

        let registration = self.graph_cache.registration();
        let secrets = match hydrate_event(descriptor, &envelope, registration.as_ref()) {
            Ok(secrets) => secrets,
            Err(err) => {
                error!(
                    "Dispatch of '{}' failed ({}): {err}",
                    envelope.operation_name, envelope.correlation_id
                );
                self.listeners.event_failed(&envelope, &err.to_string());
                completion.fail(err);
                return;
            }
        };

        let ctx = self.execution_context(Incoming::Event(envelope.clone()), secrets);
        self.listeners.event_starting(&envelope);

        let handler = Arc::clone(&descriptor.handler);
        let payload = envelope.payload.clone();
        let cls_ctx = ctx.cls();
        let span = info_span!("event", operation = %envelope.operation_name,
            correlation_id = %envelope.correlation_id);
        let outcome = run_handler(cls_ctx, async move {
            handler.handle(&ctx, &payload).await
        })
        .instrument(span)
        .await;

        match outcome {
            Ok(result) if result.is_success() => {
                debug!(
                    "Event '{}' succeeded ({})",
                    envelope.operation_name, envelope.correlation_id
                );
                self.listeners.event_successful(&envelope, &result);
                completion.succeed(result);
            }
            Ok(result) => {
                let err = AutomationError::HandlerExecution(
                    result
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("handler returned code {}", result.code)),
                );
                error!(
                    "Event '{}' failed ({}): {err}",
                    envelope.operation_name, envelope.correlation_id
                );
                self.listeners.event_failed(&envelope, &err.to_string());
                completion.fail(err);
            }
            Err(err) => {
                error!(
                    "Event '{}' failed ({}): {err}",
                    envelope.operation_name, envelope.correlation_id
                );
                self.listeners.event_failed(&envelope, &err.to_string());
                completion.fail(err);
            }
        }
    }

    /// Derive the per-invocation context: correlation id, team id, bound
    /// message client, and the per-team graph capability. The envelope's
    /// correlation id is already assigned at this point.
    fn execution_context(
        &self,
        envelope: Incoming,
        secrets: HashMap<String, String>,
    ) -> ExecutionContext {
        let correlation_id = envelope.correlation_id().to_string();
        let team_id = envelope.team_id().to_string();
        let graph = self.graph_cache.get_or_create(&team_id);
        let message_client = Arc::new(BoundMessageClient::new(
            envelope.clone(),
            Arc::clone(&self.sender),
        ));
        ExecutionContext::new(
            correlation_id,
            team_id,
            envelope,
            message_client,
            graph,
            secrets,
        )
    }
}

/// Run handler logic inside the invocation's ambient scope, converting
/// panics into execution failures so handler code never takes down the
/// hosting process.
async fn run_handler<F>(cls_ctx: ClsContext, fut: F) -> Result<HandlerResult>
where
    F: Future<Output = Result<HandlerResult>>,
{
    let fut = cls::scope(cls_ctx, fut);
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            Err(AutomationError::HandlerExecution(detail))
        }
    }
}
