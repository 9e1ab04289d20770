//! Graph query capability: per-team GraphQL clients, cached for the
//! lifetime of a registration.
//!
//! A worker created before registration arrives hands out an inert
//! `GraphHandle::Unavailable` instead of failing the invocation; handlers
//! that never query still succeed, and the failure surfaces only at the
//! point of use.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;
use serde_json::json;

use crate::core::{AutomationError, RegistrationConfirmation, Result};
use crate::retry::{RetryPolicy, with_retry};

/// A long-lived GraphQL client for one team.
pub struct GraphClient {
    endpoint: String,
    jwt: String,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl GraphClient {
    pub fn new(endpoint: String, jwt: String, retry: RetryPolicy) -> Self {
        Self {
            endpoint,
            jwt,
            http: reqwest::Client::new(),
            retry,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute a GraphQL query. Network failures and upstream 5xx responses
    /// are retried with bounded backoff; 4xx responses are not.
    pub async fn query(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let body = json!({ "query": query, "variables": variables });
        with_retry(&self.retry, AutomationError::is_transient, move || {
            let body = body.clone();
            async move {
                let response = self
                    .http
                    .post(&self.endpoint)
                    .bearer_auth(&self.jwt)
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                if status.is_server_error() {
                    return Err(AutomationError::GraphQuery(format!(
                        "upstream returned {status}"
                    )));
                }
                if status.is_client_error() {
                    return Err(AutomationError::GraphQueryRejected(format!(
                        "upstream returned {status}"
                    )));
                }
                Ok(response.json::<serde_json::Value>().await?)
            }
        })
        .await
    }
}

/// Graph capability handed to an invocation. `Unavailable` is a valid,
/// inert state: queries fail with `TransportUnavailable` at the call site.
#[derive(Clone)]
pub enum GraphHandle {
    Connected(Arc<GraphClient>),
    Unavailable,
}

impl GraphHandle {
    pub fn is_available(&self) -> bool {
        matches!(self, GraphHandle::Connected(_))
    }

    pub async fn query(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value> {
        match self {
            GraphHandle::Connected(client) => client.query(query, variables).await,
            GraphHandle::Unavailable => Err(AutomationError::TransportUnavailable(
                "no registration received".to_string(),
            )),
        }
    }
}

/// Per-team cache of graph clients, owned by one dispatcher instance.
///
/// Clients are created lazily on first use per team, reused afterwards, and
/// invalidated only when registration credentials change.
pub struct GraphClientCache {
    graph_url: String,
    retry: RetryPolicy,
    registration: RwLock<Option<RegistrationConfirmation>>,
    clients: RwLock<HashMap<String, Arc<GraphClient>>>,
}

impl GraphClientCache {
    pub fn new(graph_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            graph_url: graph_url.into(),
            retry,
            registration: RwLock::new(None),
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Install (or replace) registration credentials. Changing credentials
    /// drops every cached client so the next use reconnects with the new
    /// token.
    pub fn set_registration(&self, registration: RegistrationConfirmation) {
        let mut current = self
            .registration
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if current.as_ref() == Some(&registration) {
            return;
        }
        debug!("Receiving registration for connection '{}'", registration.name);
        *current = Some(registration);
        self.clients
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn registration(&self) -> Option<RegistrationConfirmation> {
        self.registration
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Get the cached client for a team, creating it on first use. Yields
    /// `Unavailable` (not an error) when no registration has arrived yet.
    pub fn get_or_create(&self, team_id: &str) -> GraphHandle {
        {
            let clients = self
                .clients
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(client) = clients.get(team_id) {
                debug!("Re-using cached graph client for team '{team_id}'");
                return GraphHandle::Connected(Arc::clone(client));
            }
        }

        // Hold the registration lock across construction and insert, in the
        // same order `set_registration` takes its locks: a concurrent
        // credential change either completes its invalidation before this
        // snapshot or clears the entry inserted here afterwards, so a client
        // built with replaced credentials never survives.
        let registration = self
            .registration
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(registration) = registration.as_ref() else {
            debug!("Unable to create graph client for team '{team_id}': not registered");
            return GraphHandle::Unavailable;
        };

        let mut clients = self
            .clients
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Re-check under the write lock so a racing invocation for the same
        // team does not construct a second client.
        let client = clients
            .entry(team_id.to_string())
            .or_insert_with(|| {
                debug!("Creating new graph client for team '{team_id}'");
                Arc::new(GraphClient::new(
                    format!("{}/{team_id}", self.graph_url),
                    registration.jwt.clone(),
                    self.retry.clone(),
                ))
            })
            .clone();
        GraphHandle::Connected(client)
    }
}
