use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Handler '{0}' not found")]
    HandlerNotFound(String),

    #[error("Parameter validation failed: {0}")]
    ParameterValidation(String),

    #[error("Handler execution failed: {0}")]
    HandlerExecution(String),

    #[error("Response messages are not supported for event handlers")]
    RespondNotSupported,

    #[error("Graph endpoint unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Graph query failed: {0}")]
    GraphQuery(String),

    #[error("Graph query rejected: {0}")]
    GraphQueryRejected(String),

    #[error("Send error: {0}")]
    SendError(String),

    #[error("Registry error: {0}")]
    Registry(String),
}

pub type Result<T> = std::result::Result<T, AutomationError>;

impl AutomationError {
    /// Transient failures (network, upstream 5xx) are candidates for retry;
    /// validation and not-found conditions never are.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AutomationError::GraphQuery(_) | AutomationError::SendError(_)
        )
    }
}

impl From<reqwest::Error> for AutomationError {
    fn from(err: reqwest::Error) -> Self {
        Self::GraphQuery(err.to_string())
    }
}
