use crate::retry::RetryPolicy;

/// Runtime configuration
///
/// Covers the identity of this automation client, the graph endpoint its
/// workers query, and the size of the worker pool.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Name this client registers under.
    pub name: String,
    /// Version reported alongside the name.
    pub version: String,
    /// Base URL of the graph endpoint; the team id is appended per client.
    pub graph_url: String,
    /// Number of workers in the cluster pool.
    pub workers: usize,
    /// Retry policy applied to graph queries.
    pub retry: RetryPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            graph_url: "https://automation.example.com/graphql/team".to_string(),
            workers: 2,
            retry: RetryPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_graph_url(mut self, graph_url: impl Into<String>) -> Self {
        self.graph_url = graph_url.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
