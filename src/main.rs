use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use log::info;

use automaton::{
    ClusterCoordinator, CommandDescriptor, CommandHandler, ExecutionContext, HandlerRegistry,
    HandlerResult, HydratedCommand, InMemoryEventStore, MessageClient, MessageOptions,
    OutboundMessageEnvelope, ParameterSpec, RegistrationConfirmation, Result, RuntimeConfig,
    SlackMessage, StoreListener, Transport, WorkerOutbound,
};

#[derive(Parser, Debug)]
#[command(name = "automaton", about = "Automation handler runtime")]
struct Args {
    /// Number of workers in the cluster pool
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// Base URL of the graph endpoint
    #[arg(long, default_value = "https://automation.example.com/graphql/team")]
    graph_url: String,
}

/// Transport stub that logs every frame instead of writing to a socket.
struct LoggingTransport;

impl Transport for LoggingTransport {
    fn send_message(&self, envelope: &OutboundMessageEnvelope) -> Result<()> {
        info!(
            "-> message {} destinations ({})",
            envelope.destinations.len(),
            envelope.correlation_id
        );
        Ok(())
    }

    fn send_lifecycle(&self, frame: &WorkerOutbound) -> Result<()> {
        info!(
            "-> {}",
            serde_json::to_string(frame).unwrap_or_else(|_| "<unserializable>".to_string())
        );
        Ok(())
    }
}

struct HelloWorld;

#[async_trait]
impl CommandHandler for HelloWorld {
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        invocation: &HydratedCommand,
    ) -> automaton::Result<HandlerResult> {
        let name = invocation.parameter("name").unwrap_or("world");
        ctx.message_client()
            .address_channels(
                &SlackMessage::text(format!("Hello, {name}!")),
                &ctx.team_id,
                &["general"],
                &MessageOptions::default(),
            )
            .await?;
        Ok(HandlerResult::success())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut registry = HandlerRegistry::new();
    registry.register_command(
        CommandDescriptor::new("HelloWorld", Arc::new(HelloWorld))
            .with_description("Greets the caller")
            .with_parameter(ParameterSpec::required("name").with_pattern("^[A-Za-z ]+$")),
    )?;

    let config = RuntimeConfig::default()
        .with_workers(args.workers)
        .with_graph_url(args.graph_url);

    let store = Arc::new(InMemoryEventStore::new());
    let coordinator = ClusterCoordinator::start(
        &config,
        Arc::new(registry),
        Arc::new(LoggingTransport),
        &[Arc::new(StoreListener::new(store.clone()))],
    );

    coordinator.register(RegistrationConfirmation::new("demo-jwt", "demo-connection"))?;
    coordinator.dispatch_command(
        automaton::CommandEnvelope::new("HelloWorld", "T1").with_parameter("name", "Automaton"),
    )?;

    // Give in-flight work a moment to complete before draining the pool.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    coordinator.shutdown().await;

    info!("Recorded {} lifecycle results", store.results().len());
    Ok(())
}
