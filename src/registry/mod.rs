//! Handler registry: the static lookup table from command / subscription
//! names to executable handler logic.
//!
//! Built mutably during startup, then shared read-only behind an `Arc` for
//! the lifetime of the process. Lookup is by exact name; a missing handler
//! is a resolvable, non-fatal condition reported to the dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{AutomationError, HandlerResult, Result};
use crate::dispatch::context::ExecutionContext;
use crate::dispatch::hydrate::HydratedCommand;

/// Business logic bound to a command name.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        invocation: &HydratedCommand,
    ) -> Result<HandlerResult>;
}

/// Business logic bound to an event subscription.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        payload: &serde_json::Value,
    ) -> Result<HandlerResult>;
}

/// Declared command parameter: name, whether it must be supplied, and an
/// optional validation regex applied to the supplied value.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub required: bool,
    pub pattern: Option<String>,
    pub description: Option<String>,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            pattern: None,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            pattern: None,
            description: None,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Declared mapped parameter: resolved by the transport from workspace
/// context rather than typed by a user.
#[derive(Debug, Clone)]
pub struct MappedParameterSpec {
    pub local_key: String,
    pub foreign_key: String,
}

/// Declared secret: `name` is how the handler refers to it, `path` is the
/// lookup key in the secret store (e.g. `github://user_token`).
#[derive(Debug, Clone)]
pub struct SecretSpec {
    pub name: String,
    pub path: String,
}

/// Everything the dispatcher needs to know about one registered command.
#[derive(Clone)]
pub struct CommandDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Vec<ParameterSpec>,
    pub mapped_parameters: Vec<MappedParameterSpec>,
    pub secrets: Vec<SecretSpec>,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            mapped_parameters: Vec::new(),
            secrets: Vec::new(),
            handler,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn with_mapped_parameter(
        mut self,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.mapped_parameters.push(MappedParameterSpec {
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
        });
        self
    }

    pub fn with_secret(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.secrets.push(SecretSpec {
            name: name.into(),
            path: path.into(),
        });
        self
    }
}

/// Everything the dispatcher needs to know about one event subscription.
#[derive(Clone)]
pub struct EventDescriptor {
    pub subscription_name: String,
    pub description: Option<String>,
    pub secrets: Vec<SecretSpec>,
    pub handler: Arc<dyn EventHandler>,
}

impl EventDescriptor {
    pub fn new(subscription_name: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            subscription_name: subscription_name.into(),
            description: None,
            secrets: Vec::new(),
            handler,
        }
    }

    pub fn with_secret(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.secrets.push(SecretSpec {
            name: name.into(),
            path: path.into(),
        });
        self
    }
}

/// Registry of handlers (name -> descriptor).
///
/// Built during initialization (mutable), used during runtime (immutable
/// behind `Arc`), so concurrent lookups need no locking.
#[derive(Default)]
pub struct HandlerRegistry {
    commands: HashMap<String, CommandDescriptor>,
    events: HashMap<String, EventDescriptor>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            events: HashMap::new(),
        }
    }

    /// Register a command handler. Duplicate names are rejected rather than
    /// silently overwritten.
    pub fn register_command(&mut self, descriptor: CommandDescriptor) -> Result<()> {
        if self.commands.contains_key(&descriptor.name) {
            return Err(AutomationError::Registry(format!(
                "duplicate command handler '{}'",
                descriptor.name
            )));
        }
        self.commands.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Register an event handler for a subscription name.
    pub fn register_event(&mut self, descriptor: EventDescriptor) -> Result<()> {
        if self.events.contains_key(&descriptor.subscription_name) {
            return Err(AutomationError::Registry(format!(
                "duplicate event handler '{}'",
                descriptor.subscription_name
            )));
        }
        self.events
            .insert(descriptor.subscription_name.clone(), descriptor);
        Ok(())
    }

    pub fn resolve_command(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.get(name)
    }

    pub fn resolve_event(&self, subscription_name: &str) -> Option<&EventDescriptor> {
        self.events.get(subscription_name)
    }

    pub fn command_names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len() + self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopCommand;

    #[async_trait]
    impl CommandHandler for NoopCommand {
        async fn handle(
            &self,
            _ctx: &ExecutionContext,
            _invocation: &HydratedCommand,
        ) -> Result<HandlerResult> {
            Ok(HandlerResult::success())
        }
    }

    #[test]
    fn resolves_registered_command_by_exact_name() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_command(CommandDescriptor::new("HelloWorld", Arc::new(NoopCommand)))
            .unwrap();

        assert!(registry.resolve_command("HelloWorld").is_some());
        assert!(registry.resolve_command("helloworld").is_none());
        assert!(registry.resolve_command("Other").is_none());
    }

    #[test]
    fn rejects_duplicate_command_names() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_command(CommandDescriptor::new("HelloWorld", Arc::new(NoopCommand)))
            .unwrap();
        let err = registry
            .register_command(CommandDescriptor::new("HelloWorld", Arc::new(NoopCommand)))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
