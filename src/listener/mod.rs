//! Lifecycle listeners: observers notified on every dispatch transition.
//!
//! Listeners are fire-and-forget; they can neither block nor alter the
//! outcome of a dispatch. Notification always happens before the transport
//! callback fires, so observability never misses a result the caller
//! already received.

use std::sync::Arc;

use crate::core::{CommandEnvelope, EventEnvelope, HandlerResult};

/// Hooks for dispatch lifecycle transitions. Every hook has a default no-op
/// body, so listeners implement only what they care about.
pub trait AutomationEventListener: Send + Sync {
    fn command_starting(&self, _envelope: &CommandEnvelope) {}
    fn command_successful(&self, _envelope: &CommandEnvelope, _result: &HandlerResult) {}
    fn command_failed(&self, _envelope: &CommandEnvelope, _error: &str) {}

    fn event_starting(&self, _envelope: &EventEnvelope) {}
    fn event_successful(&self, _envelope: &EventEnvelope, _result: &HandlerResult) {}
    fn event_failed(&self, _envelope: &EventEnvelope, _error: &str) {}
}

/// Fan-out over a fixed set of listeners, assembled at processor
/// construction and immutable afterwards.
#[derive(Clone, Default)]
pub struct ListenerBus {
    listeners: Vec<Arc<dyn AutomationEventListener>>,
}

impl ListenerBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn push(&mut self, listener: Arc<dyn AutomationEventListener>) {
        self.listeners.push(listener);
    }

    pub fn command_starting(&self, envelope: &CommandEnvelope) {
        for listener in &self.listeners {
            listener.command_starting(envelope);
        }
    }

    pub fn command_successful(&self, envelope: &CommandEnvelope, result: &HandlerResult) {
        for listener in &self.listeners {
            listener.command_successful(envelope, result);
        }
    }

    pub fn command_failed(&self, envelope: &CommandEnvelope, error: &str) {
        for listener in &self.listeners {
            listener.command_failed(envelope, error);
        }
    }

    pub fn event_starting(&self, envelope: &EventEnvelope) {
        for listener in &self.listeners {
            listener.event_starting(envelope);
        }
    }

    pub fn event_successful(&self, envelope: &EventEnvelope, result: &HandlerResult) {
        for listener in &self.listeners {
            listener.event_successful(envelope, result);
        }
    }

    pub fn event_failed(&self, envelope: &EventEnvelope, error: &str) {
        for listener in &self.listeners {
            listener.event_failed(envelope, error);
        }
    }
}
