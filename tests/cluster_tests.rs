use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use automaton::{
    ClusterCoordinator, CommandDescriptor, CommandEnvelope, CommandHandler, EventDescriptor,
    EventEnvelope, EventHandler, ExecutionContext, HandlerRegistry, HandlerResult,
    HydratedCommand, MessageClient, MessageOptions, OutboundMessageEnvelope,
    RegistrationConfirmation, RequestProcessor, Result, RuntimeConfig, SlackMessage, Transport,
    WorkerOutbound,
};

#[derive(Default)]
struct RecordingTransport {
    frames: Mutex<Vec<WorkerOutbound>>,
    messages: Mutex<Vec<OutboundMessageEnvelope>>,
}

impl RecordingTransport {
    fn frames(&self) -> Vec<WorkerOutbound> {
        self.frames.lock().unwrap().clone()
    }

    fn messages(&self) -> Vec<OutboundMessageEnvelope> {
        self.messages.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn send_message(&self, envelope: &OutboundMessageEnvelope) -> Result<()> {
        self.messages.lock().unwrap().push(envelope.clone());
        Ok(())
    }

    fn send_lifecycle(&self, frame: &WorkerOutbound) -> Result<()> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within deadline");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

struct Greeter;

#[async_trait]
impl CommandHandler for Greeter {
    async fn handle(
        &self,
        ctx: &ExecutionContext,
        invocation: &HydratedCommand,
    ) -> Result<HandlerResult> {
        let name = invocation.parameter("name").unwrap_or("world");
        ctx.message_client()
            .address_channels(
                &SlackMessage::text(format!("hello {name}")),
                &ctx.team_id,
                &["general"],
                &MessageOptions::default(),
            )
            .await?;
        Ok(HandlerResult::success())
    }
}

struct CountEvent;

#[async_trait]
impl EventHandler for CountEvent {
    async fn handle(
        &self,
        _ctx: &ExecutionContext,
        payload: &serde_json::Value,
    ) -> Result<HandlerResult> {
        let n = payload.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(HandlerResult::success().with_message(format!("n={n}")))
    }
}

fn registry() -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    registry
        .register_command(CommandDescriptor::new("Greeter", Arc::new(Greeter)))
        .unwrap();
    registry
        .register_event(EventDescriptor::new("Counted", Arc::new(CountEvent)))
        .unwrap();
    Arc::new(registry)
}

#[tokio::test]
async fn workers_report_online_status_with_client_identity() {
    let transport = Arc::new(RecordingTransport::default());
    let coordinator = ClusterCoordinator::start(
        &RuntimeConfig::new("bot-under-test").with_workers(3),
        registry(),
        transport.clone(),
        &[],
    );

    wait_until(|| {
        transport
            .frames()
            .iter()
            .filter(|f| matches!(f, WorkerOutbound::Status { .. }))
            .count()
            == 3
    })
    .await;

    let frames = transport.frames();
    let status = frames
        .iter()
        .find_map(|f| match f {
            WorkerOutbound::Status { data, .. } => Some(data.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(status["state"], "online");
    assert_eq!(status["name"], "bot-under-test");
    assert!(status.get("version").is_some());

    coordinator.shutdown().await;
}

#[tokio::test]
async fn command_result_and_message_are_relayed_through_the_transport() {
    let transport = Arc::new(RecordingTransport::default());
    let coordinator = ClusterCoordinator::start(
        &RuntimeConfig::default().with_workers(2),
        registry(),
        transport.clone(),
        &[],
    );
    coordinator
        .register(RegistrationConfirmation::new("jwt", "conn-1"))
        .unwrap();

    let envelope = CommandEnvelope::new("Greeter", "T1")
        .with_correlation_id("corr-cluster-1")
        .with_parameter("name", "cd");
    coordinator.dispatch_command(envelope).unwrap();

    wait_until(|| {
        transport
            .frames()
            .iter()
            .any(|f| matches!(f, WorkerOutbound::CommandSuccess { .. }))
    })
    .await;

    let frames = transport.frames();
    let success = frames
        .iter()
        .find_map(|f| match f {
            WorkerOutbound::CommandSuccess { event, cls, data } => Some((event, cls, data)),
            _ => None,
        })
        .unwrap();
    assert_eq!(success.0.correlation_id, "corr-cluster-1");
    assert_eq!(success.1.correlation_id, "corr-cluster-1");
    assert_eq!(success.1.team_id, "T1");
    assert!(success.2.is_success());

    wait_until(|| !transport.messages().is_empty()).await;
    let message = &transport.messages()[0];
    assert_eq!(message.correlation_id, "corr-cluster-1");
    assert_eq!(message.team.id, "T1");
    assert_eq!(message.destinations.len(), 1);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn unknown_command_is_relayed_as_failure() {
    let transport = Arc::new(RecordingTransport::default());
    let coordinator = ClusterCoordinator::start(
        &RuntimeConfig::default().with_workers(1),
        registry(),
        transport.clone(),
        &[],
    );

    coordinator
        .dispatch_command(CommandEnvelope::new("Nope", "T1"))
        .unwrap();

    wait_until(|| {
        transport
            .frames()
            .iter()
            .any(|f| matches!(f, WorkerOutbound::CommandFailure { .. }))
    })
    .await;

    let frames = transport.frames();
    let failure = frames
        .iter()
        .find_map(|f| match f {
            WorkerOutbound::CommandFailure { data, .. } => Some(data.clone()),
            _ => None,
        })
        .unwrap();
    assert!(failure.contains("not found"));

    coordinator.shutdown().await;
}

#[tokio::test]
async fn event_results_are_relayed_as_a_result_list() {
    let transport = Arc::new(RecordingTransport::default());
    let coordinator = ClusterCoordinator::start(
        &RuntimeConfig::default().with_workers(2),
        registry(),
        transport.clone(),
        &[],
    );

    coordinator
        .dispatch_event(
            EventEnvelope::new("Counted", "T1", serde_json::json!({ "n": 7 }))
                .with_correlation_id("corr-evt-1"),
        )
        .unwrap();

    wait_until(|| {
        transport
            .frames()
            .iter()
            .any(|f| matches!(f, WorkerOutbound::EventSuccess { .. }))
    })
    .await;

    let frames = transport.frames();
    let results = frames
        .iter()
        .find_map(|f| match f {
            WorkerOutbound::EventSuccess { data, .. } => Some(data.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].message.as_deref(), Some("n=7"));

    coordinator.shutdown().await;
}

#[tokio::test]
async fn concurrent_invocations_keep_their_own_correlation_ids() {
    // Two overlapping commands through one worker must not leak ambient
    // state into each other.
    use automaton::{Completion, GraphClientCache, Incoming, MessagePayload, MessageSender,
        RetryPolicy, cls};

    struct SlowClsEcho;

    #[async_trait]
    impl CommandHandler for SlowClsEcho {
        async fn handle(
            &self,
            _ctx: &ExecutionContext,
            _invocation: &HydratedCommand,
        ) -> Result<HandlerResult> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(HandlerResult::success()
                .with_message(cls::get().map(|c| c.correlation_id).unwrap_or_default()))
        }
    }

    struct NullSender;
    impl MessageSender for NullSender {
        fn send(
            &self,
            _origin: &Incoming,
            _envelope: &OutboundMessageEnvelope,
            _payload: &MessagePayload,
        ) -> Result<()> {
            Ok(())
        }
    }

    let mut registry = HandlerRegistry::new();
    registry
        .register_command(CommandDescriptor::new("Slow", Arc::new(SlowClsEcho)))
        .unwrap();
    let processor = Arc::new(RequestProcessor::new(
        Arc::new(registry),
        Arc::new(GraphClientCache::new(
            "https://graph.test",
            RetryPolicy::default(),
        )),
        Arc::new(NullSender),
    ));

    let results = Arc::new(Mutex::new(Vec::new()));
    let mut joins = Vec::new();
    for id in ["corr-a", "corr-b"] {
        let processor = Arc::clone(&processor);
        let results = Arc::clone(&results);
        joins.push(tokio::spawn(async move {
            processor
                .process_command(
                    CommandEnvelope::new("Slow", "T1").with_correlation_id(id),
                    Completion::new(
                        move |result| {
                            results
                                .lock()
                                .unwrap()
                                .push((id, result.message.unwrap_or_default()));
                        },
                        |err| panic!("unexpected failure: {err}"),
                    ),
                )
                .await;
        }));
    }
    for join in joins {
        join.await.unwrap();
    }

    for (expected, observed) in results.lock().unwrap().iter() {
        assert_eq!(observed, expected);
    }
}
