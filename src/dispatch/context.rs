//! Per-invocation execution context and ambient correlation propagation.
//!
//! Each invocation runs inside a tokio task-local scope carrying its
//! correlation id and team id, so nested asynchronous work can tag its own
//! outbound activity without threading the context through every call.
//! Concurrent invocations never observe each other's values.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::Incoming;
use crate::graph::GraphHandle;
use crate::message::client::MessageClient;

/// Ambient correlation values for one invocation, readable from anywhere
/// inside its task scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClsContext {
    pub correlation_id: String,
    pub team_id: String,
}

tokio::task_local! {
    static CLS: ClsContext;
}

pub mod cls {
    //! Invocation-scoped ambient storage, modeled as a tokio task-local.

    use std::future::Future;

    use super::{CLS, ClsContext};

    /// Run `fut` with the given ambient context installed.
    pub async fn scope<F: Future>(ctx: ClsContext, fut: F) -> F::Output {
        CLS.scope(ctx, fut).await
    }

    /// Ambient context of the current invocation, if any.
    pub fn get() -> Option<ClsContext> {
        CLS.try_with(Clone::clone).ok()
    }
}

/// Per-invocation bundle handed to handler logic.
///
/// Created fresh by the dispatcher for every envelope, owned exclusively by
/// that invocation, and discarded when it completes.
pub struct ExecutionContext {
    pub correlation_id: String,
    pub team_id: String,
    /// The raw envelope this invocation was built from.
    pub envelope: Incoming,
    message_client: Arc<dyn MessageClient>,
    graph: GraphHandle,
    secrets: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new(
        correlation_id: String,
        team_id: String,
        envelope: Incoming,
        message_client: Arc<dyn MessageClient>,
        graph: GraphHandle,
        secrets: HashMap<String, String>,
    ) -> Self {
        Self {
            correlation_id,
            team_id,
            envelope,
            message_client,
            graph,
            secrets,
        }
    }

    /// Outbound message capability bound to this invocation's envelope.
    pub fn message_client(&self) -> &Arc<dyn MessageClient> {
        &self.message_client
    }

    /// Graph query capability for this team. May be inert when no
    /// registration has arrived yet; the failure surfaces on first use.
    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }

    /// Hydrated secret value by its declared name.
    pub fn secret(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(String::as_str)
    }

    pub fn cls(&self) -> ClsContext {
        ClsContext {
            correlation_id: self.correlation_id.clone(),
            team_id: self.team_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cls_is_isolated_between_concurrent_tasks() {
        let a = tokio::spawn(cls::scope(
            ClsContext {
                correlation_id: "corr-a".to_string(),
                team_id: "T1".to_string(),
            },
            async {
                tokio::task::yield_now().await;
                cls::get().unwrap().correlation_id
            },
        ));
        let b = tokio::spawn(cls::scope(
            ClsContext {
                correlation_id: "corr-b".to_string(),
                team_id: "T2".to_string(),
            },
            async {
                tokio::task::yield_now().await;
                cls::get().unwrap().correlation_id
            },
        ));

        assert_eq!(a.await.unwrap(), "corr-a");
        assert_eq!(b.await.unwrap(), "corr-b");
    }

    #[tokio::test]
    async fn cls_is_absent_outside_a_scope() {
        assert!(cls::get().is_none());
    }
}
