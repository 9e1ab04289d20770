//! Cluster coordinator: the single owner of the transport connection.
//!
//! Spawns a fixed pool of workers over bidirectional channels, pushes
//! registration material to each of them, assigns envelopes round-robin,
//! and relays worker output back out through the transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::task::JoinHandle;

use crate::config::RuntimeConfig;
use crate::core::{
    CommandEnvelope, EventEnvelope, Incoming, RegistrationConfirmation, Result,
};
use crate::listener::AutomationEventListener;
use crate::message::client::MessageClient;
use crate::message::{BoundMessageClient, MessagePayload, MessageSender, OutboundMessageEnvelope};
use crate::registry::HandlerRegistry;

use super::protocol::{WorkerInbound, WorkerOutbound};
use super::worker::{WorkerHandle, spawn_worker};

/// The transport connection the coordinator writes to. Implementations are
/// expected to be non-blocking writers (socket write, queue push).
pub trait Transport: Send + Sync {
    /// Deliver one constructed outbound message.
    fn send_message(&self, envelope: &OutboundMessageEnvelope) -> Result<()>;
    /// Forward a lifecycle frame (status or result) as-is.
    fn send_lifecycle(&self, frame: &WorkerOutbound) -> Result<()>;
}

/// Adapts the transport into a `MessageSender` for envelope rebuilding.
struct TransportMessageSender {
    transport: Arc<dyn Transport>,
}

impl MessageSender for TransportMessageSender {
    fn send(
        &self,
        _origin: &Incoming,
        envelope: &OutboundMessageEnvelope,
        _payload: &MessagePayload,
    ) -> Result<()> {
        self.transport.send_message(envelope)
    }
}

pub struct ClusterCoordinator {
    workers: Vec<WorkerHandle>,
    next: AtomicUsize,
    relay: JoinHandle<()>,
}

impl ClusterCoordinator {
    /// Spawn the worker pool and start relaying worker output to the
    /// transport.
    pub fn start(
        config: &RuntimeConfig,
        registry: Arc<HandlerRegistry>,
        transport: Arc<dyn Transport>,
        listeners: &[Arc<dyn AutomationEventListener>],
    ) -> Self {
        let pool_size = config.workers.max(1);
        info!("Starting cluster coordinator with {pool_size} workers");

        let (outbound_tx, outbound_rx) = unbounded_channel();
        let workers = (0..pool_size)
            .map(|id| {
                spawn_worker(
                    id,
                    Arc::clone(&registry),
                    config,
                    outbound_tx.clone(),
                    listeners,
                )
            })
            .collect();
        drop(outbound_tx);

        let relay = tokio::spawn(relay_loop(outbound_rx, transport));

        Self {
            workers,
            next: AtomicUsize::new(0),
            relay,
        }
    }

    /// Push registration material to every worker independently.
    pub fn register(&self, registration: RegistrationConfirmation) -> Result<()> {
        for worker in &self.workers {
            worker.send(WorkerInbound::Registration {
                data: registration.clone(),
            })?;
        }
        Ok(())
    }

    /// Assign a command envelope to the next worker in the rotation.
    pub fn dispatch_command(&self, envelope: CommandEnvelope) -> Result<()> {
        self.assign(WorkerInbound::Command { data: envelope })
    }

    /// Assign an event envelope to the next worker in the rotation.
    pub fn dispatch_event(&self, envelope: EventEnvelope) -> Result<()> {
        self.assign(WorkerInbound::Event { data: envelope })
    }

    pub fn dispatch(&self, incoming: Incoming) -> Result<()> {
        match incoming {
            Incoming::Command(envelope) => self.dispatch_command(envelope),
            Incoming::Event(envelope) => self.dispatch_event(envelope),
        }
    }

    fn assign(&self, message: WorkerInbound) -> Result<()> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        debug!("Assigning envelope to worker {index}");
        self.workers[index].send(message)
    }

    /// Close all worker channels, wait for in-flight work to drain, then
    /// stop the relay.
    pub async fn shutdown(self) {
        for worker in self.workers {
            worker.shutdown().await;
        }
        let _ = self.relay.await;
    }
}

async fn relay_loop(
    mut outbound: UnboundedReceiver<WorkerOutbound>,
    transport: Arc<dyn Transport>,
) {
    while let Some(frame) = outbound.recv().await {
        match frame {
            WorkerOutbound::Message { event, cls, data } => {
                relay_message(&transport, event, &cls.correlation_id, data).await;
            }
            other => {
                if let Err(err) = transport.send_lifecycle(&other) {
                    error!("Forwarding lifecycle frame failed: {err}");
                }
            }
        }
    }
    debug!("Coordinator relay stopped");
}

/// Rebuild the wire envelope for a worker-forwarded send and hand it to the
/// transport, with the worker's ambient tags re-attached for diagnostics.
async fn relay_message(
    transport: &Arc<dyn Transport>,
    event: Incoming,
    correlation_id: &str,
    data: MessagePayload,
) {
    let sender = Arc::new(TransportMessageSender {
        transport: Arc::clone(transport),
    });
    let team_id = event.team_id().to_string();
    let client = BoundMessageClient::new(event, sender);

    let result = if !data.user_names.is_empty() {
        let names: Vec<&str> = data.user_names.iter().map(String::as_str).collect();
        client
            .address_users(&data.message, &team_id, &names, &data.options)
            .await
    } else if !data.channel_names.is_empty() {
        let names: Vec<&str> = data.channel_names.iter().map(String::as_str).collect();
        client
            .address_channels(&data.message, &team_id, &names, &data.options)
            .await
    } else {
        client.respond(&data.message, &data.options).await
    };

    if let Err(err) = result {
        error!("Relaying worker message failed ({correlation_id}): {err}");
    }
}
