pub mod envelope;
pub mod error;
pub mod types;

pub use envelope::{
    CommandEnvelope, EventEnvelope, Incoming, MessageSource, Parameter, Secret, Team,
};
pub use error::{AutomationError, Result};
pub use types::{HandlerResult, LifecycleOutcome, LifecycleResult, RegistrationConfirmation};
