//! Cluster worker: hosts one dispatcher instance plus its own graph-client
//! cache, and talks to the coordinator exclusively over channels.
//!
//! Workers are stateless with respect to routing; the coordinator decides
//! which envelopes they receive. Registration is cached locally, and a
//! worker created before registration arrives simply defers graph-client
//! creation until it lands.

use std::sync::Arc;

use log::{debug, info};
use serde_json::json;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

use crate::config::RuntimeConfig;
use crate::core::{AutomationError, Incoming, Result};
use crate::dispatch::{ClsContext, Completion, RequestProcessor};
use crate::graph::GraphClientCache;
use crate::listener::AutomationEventListener;
use crate::message::{MessagePayload, MessageSender, OutboundMessageEnvelope};
use crate::registry::HandlerRegistry;

use super::protocol::{WorkerInbound, WorkerOutbound};

/// Coordinator-side handle to one worker.
pub struct WorkerHandle {
    pub id: usize,
    inbound: Option<UnboundedSender<WorkerInbound>>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn send(&self, message: WorkerInbound) -> Result<()> {
        self.inbound
            .as_ref()
            .ok_or_else(|| AutomationError::SendError("worker already shut down".to_string()))?
            .send(message)
            .map_err(|e| AutomationError::SendError(e.to_string()))
    }

    /// Close the inbound channel and wait for the worker loop to drain.
    pub async fn shutdown(mut self) {
        self.inbound.take();
        let _ = self.join.await;
    }
}

/// Forwards logical sends over the worker's outbound channel instead of
/// writing to the wire; the coordinator rebuilds the envelope on its side.
struct WorkerMessageSender {
    outbound: UnboundedSender<WorkerOutbound>,
}

impl MessageSender for WorkerMessageSender {
    fn send(
        &self,
        origin: &Incoming,
        _envelope: &OutboundMessageEnvelope,
        payload: &MessagePayload,
    ) -> Result<()> {
        let cls = crate::dispatch::cls::get().unwrap_or_default();
        self.outbound
            .send(WorkerOutbound::Message {
                event: origin.clone(),
                cls,
                data: payload.clone(),
            })
            .map_err(|e| AutomationError::SendError(e.to_string()))
    }
}

/// Spawn one worker task with its own processor and graph cache.
pub fn spawn_worker(
    id: usize,
    registry: Arc<HandlerRegistry>,
    config: &RuntimeConfig,
    outbound: UnboundedSender<WorkerOutbound>,
    listeners: &[Arc<dyn AutomationEventListener>],
) -> WorkerHandle {
    let (inbound_tx, inbound_rx) = unbounded_channel();

    let graph_cache = Arc::new(GraphClientCache::new(
        config.graph_url.clone(),
        config.retry.clone(),
    ));
    let sender = Arc::new(WorkerMessageSender {
        outbound: outbound.clone(),
    });
    let mut processor = RequestProcessor::new(registry, Arc::clone(&graph_cache), sender);
    for listener in listeners {
        processor = processor.with_listener(Arc::clone(listener));
    }

    let join = tokio::spawn(worker_loop(
        id,
        config.name.clone(),
        config.version.clone(),
        inbound_rx,
        outbound,
        Arc::new(processor),
        graph_cache,
    ));

    WorkerHandle {
        id,
        inbound: Some(inbound_tx),
        join,
    }
}

async fn worker_loop(
    id: usize,
    name: String,
    version: String,
    mut inbound: UnboundedReceiver<WorkerInbound>,
    outbound: UnboundedSender<WorkerOutbound>,
    processor: Arc<RequestProcessor>,
    graph_cache: Arc<GraphClientCache>,
) {
    info!("Starting worker {id} for '{name}' {version}");
    let _ = outbound.send(WorkerOutbound::Status {
        cls: ClsContext::default(),
        data: json!({
            "state": "online",
            "worker": id,
            "name": name,
            "version": version,
        }),
    });

    while let Some(message) = inbound.recv().await {
        match message {
            WorkerInbound::Registration { data } => {
                debug!("Worker {id} caching registration '{}'", data.name);
                graph_cache.set_registration(data);
            }
            WorkerInbound::Command { data } => {
                let processor = Arc::clone(&processor);
                let tx = outbound.clone();
                // Invocations run concurrently; the worker loop stays free
                // to take the next assignment.
                tokio::spawn(async move {
                    let cls = ClsContext {
                        correlation_id: data.correlation_id.clone(),
                        team_id: data.team.id.clone(),
                    };
                    let success_event = data.clone();
                    let failure_event = data.clone();
                    let success_tx = tx.clone();
                    let success_cls = cls.clone();
                    let completion = Completion::new(
                        move |result| {
                            let _ = success_tx.send(WorkerOutbound::CommandSuccess {
                                event: success_event,
                                cls: success_cls,
                                data: result,
                            });
                        },
                        move |err| {
                            let _ = tx.send(WorkerOutbound::CommandFailure {
                                event: failure_event,
                                cls,
                                data: err.to_string(),
                            });
                        },
                    );
                    processor.process_command(data, completion).await;
                });
            }
            WorkerInbound::Event { data } => {
                let processor = Arc::clone(&processor);
                let tx = outbound.clone();
                tokio::spawn(async move {
                    let cls = ClsContext {
                        correlation_id: data.correlation_id.clone(),
                        team_id: data.team_id.clone(),
                    };
                    let success_event = data.clone();
                    let failure_event = data.clone();
                    let success_tx = tx.clone();
                    let success_cls = cls.clone();
                    let completion = Completion::new(
                        move |result| {
                            let _ = success_tx.send(WorkerOutbound::EventSuccess {
                                event: success_event,
                                cls: success_cls,
                                data: vec![result],
                            });
                        },
                        move |err| {
                            let _ = tx.send(WorkerOutbound::EventFailure {
                                event: failure_event,
                                cls,
                                data: err.to_string(),
                            });
                        },
                    );
                    processor.process_event(data, completion).await;
                });
            }
        }
    }
    debug!("Worker {id} shutting down");
}
