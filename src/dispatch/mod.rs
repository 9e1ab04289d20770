pub mod context;
pub mod hydrate;
pub mod processor;

pub use context::{ClsContext, ExecutionContext, cls};
pub use hydrate::HydratedCommand;
pub use processor::{Completion, RequestProcessor};
