// ============================================================================
// Automaton Library
// ============================================================================

pub mod cluster;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod graph;
pub mod listener;
pub mod message;
pub mod registry;
pub mod retry;
pub mod store;

// Re-export main types for convenience
pub use crate::core::{
    AutomationError, CommandEnvelope, EventEnvelope, HandlerResult, Incoming, LifecycleOutcome,
    LifecycleResult, MessageSource, Parameter, RegistrationConfirmation, Result, Secret, Team,
};

pub use crate::cluster::{ClusterCoordinator, Transport, WorkerInbound, WorkerOutbound};
pub use crate::config::RuntimeConfig;
pub use crate::dispatch::{
    ClsContext, Completion, ExecutionContext, HydratedCommand, RequestProcessor, cls,
};
pub use crate::graph::{GraphClient, GraphClientCache, GraphHandle};
pub use crate::listener::{AutomationEventListener, ListenerBus};
pub use crate::message::{
    Attachment, BoundMessageClient, CommandButton, Destination, MessageClient, MessageOptions,
    MessagePayload, MessageSender, OutboundMessageEnvelope, SlackMessage, button_for_command,
};
pub use crate::registry::{
    CommandDescriptor, CommandHandler, EventDescriptor, EventHandler, HandlerRegistry,
    MappedParameterSpec, ParameterSpec, SecretSpec,
};
pub use crate::retry::{RetryPolicy, with_retry};
pub use crate::store::{EventStore, InMemoryEventStore, SeriesPoint, StoreListener};
