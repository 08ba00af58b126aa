use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::events::{EventPayload, SlackEnvelope, SlackPayload};
use crate::registry::{DispatchError, EventContext, SlackRouter};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PumpExit {
    StreamClosed,
    ShutdownRequested,
}

/// Reads envelopes one at a time, acknowledges each, then dispatches it inline.
pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    router: Arc<SlackRouter>,
    reconnect_policy: ReconnectPolicy,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Default for SocketModeRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopSocketTransport),
            router: Arc::new(SlackRouter::default()),
            reconnect_policy: ReconnectPolicy::default(),
            shutdown: None,
        }
    }
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        router: Arc<SlackRouter>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, router, reconnect_policy, shutdown: None }
    }

    /// Stops reading new envelopes once the watched value turns `true`. An envelope that is
    /// already being dispatched runs to completion.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub async fn start(&self) -> Result<()> {
        let mut shutdown = self.shutdown.clone();

        for attempt in 0..=self.reconnect_policy.max_retries {
            if shutdown_requested(&shutdown) {
                info!(attempt, "shutdown requested before connecting; socket loop not started");
                return Ok(());
            }

            match self.connect_and_pump(attempt, &mut shutdown).await {
                Ok(exit) => {
                    info!(attempt, ?exit, "socket mode loop finished");
                    return Ok(());
                }
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = wait_for_shutdown(&mut shutdown) => return Ok(()),
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        shutdown: &mut Option<watch::Receiver<bool>>,
    ) -> Result<PumpExit, TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let next = tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => None,
                next = self.transport.next_envelope() => Some(next?),
            };

            let envelope = match next {
                None => {
                    info!(attempt, "shutdown requested; closing socket mode transport");
                    self.transport.disconnect().await?;
                    return Ok(PumpExit::ShutdownRequested);
                }
                Some(None) => {
                    info!(attempt, "socket mode transport stream closed");
                    self.transport.disconnect().await?;
                    return Ok(PumpExit::StreamClosed);
                }
                Some(Some(envelope)) => envelope,
            };

            self.handle_envelope(&envelope).await;
        }
    }

    async fn handle_envelope(&self, envelope: &SlackEnvelope) {
        let (channel_id, user_id) = correlation_fields(envelope);

        info!(
            event_name = "ingress.slack.envelope_received",
            envelope_id = %envelope.envelope_id,
            family = envelope.payload.family(),
            correlation_id = %envelope.envelope_id,
            channel_id = channel_id.as_deref().unwrap_or("unknown"),
            user_id = user_id.as_deref().unwrap_or("unknown"),
            "received slack envelope"
        );

        if envelope.requires_ack() {
            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }
        }

        let context = EventContext::new(envelope.envelope_id.clone());
        match self.router.dispatch(envelope, &context).await {
            Ok(outcome) => debug!(
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                ?outcome,
                "envelope handled"
            ),
            Err(error @ DispatchError::Handler(_)) => warn!(
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.as_deref().unwrap_or("unknown"),
                error = %error,
                "handler failed; continuing socket loop"
            ),
            Err(error) => warn!(
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                error = %error,
                "event dispatch failed; continuing socket loop"
            ),
        }
    }
}

fn shutdown_requested(shutdown: &Option<watch::Receiver<bool>>) -> bool {
    shutdown.as_ref().is_some_and(|receiver| *receiver.borrow())
}

async fn wait_for_shutdown(shutdown: &mut Option<watch::Receiver<bool>>) {
    let Some(receiver) = shutdown.as_mut() else {
        return std::future::pending().await;
    };

    loop {
        if *receiver.borrow_and_update() {
            return;
        }
        if receiver.changed().await.is_err() {
            // sender dropped without signalling; keep running
            return std::future::pending().await;
        }
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<String>, Option<String>) {
    match &envelope.payload {
        SlackPayload::Event(EventPayload::AppMention(event) | EventPayload::Message(event)) => {
            (Some(event.channel.clone()), event.user.clone())
        }
        SlackPayload::Event(
            EventPayload::ReactionAdded(event) | EventPayload::ReactionRemoved(event),
        ) => (Some(event.item.channel.clone()), Some(event.user.clone())),
        SlackPayload::SlashCommand(payload) => {
            (Some(payload.channel_id.clone()), Some(payload.user_id.clone()))
        }
        SlackPayload::Interactive(payload) => {
            (payload.channel_id().map(str::to_owned), Some(payload.user.id.clone()))
        }
        SlackPayload::Event(EventPayload::Unrecognized { .. })
        | SlackPayload::Unrecognized { .. } => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tars_core::errors::ApplicationError;
    use tokio::sync::{watch, Mutex};

    use super::{ReconnectPolicy, SocketModeRunner, SocketTransport, TransportError};
    use crate::commands::SlashCommandPayload;
    use crate::events::{SlackEnvelope, SlackPayload};
    use crate::registry::{EventContext, Handler, HandlerOutcome, SlackRouter};

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<SlackEnvelope>, TransportError>>,
        disconnect_results: VecDeque<Result<(), TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<SlackEnvelope>, TransportError>>,
            disconnect_results: Vec<Result<(), TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    disconnect_results: disconnect_results.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(envelope_id.to_owned());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            state.disconnect_results.pop_front().unwrap_or(Ok(()))
        }
    }

    /// Transport that never yields an envelope.
    struct IdleTransport;

    #[async_trait]
    impl SocketTransport for IdleTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            std::future::pending().await
        }

        async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingCommand {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Handler<SlashCommandPayload> for CountingCommand {
        async fn handle(
            &self,
            _payload: &SlashCommandPayload,
            _ctx: &EventContext,
        ) -> Result<HandlerOutcome, ApplicationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ApplicationError::Validation("boom".to_owned()))
        }
    }

    fn stats_command(envelope_id: &str) -> SlackEnvelope {
        SlackEnvelope::new(
            envelope_id,
            SlackPayload::SlashCommand(SlashCommandPayload {
                command: "/stats".to_owned(),
                text: String::new(),
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                trigger_id: "t-1".to_owned(),
                response_url: None,
            }),
        )
    }

    fn no_delay() -> ReconnectPolicy {
        ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![
                Ok(Some(SlackEnvelope::new(
                    "env-1",
                    SlackPayload::Unrecognized { envelope_type: "test".to_owned() },
                ))),
                Ok(None),
            ],
            vec![Ok(())],
        ));

        let runner =
            SocketModeRunner::new(transport.clone(), Arc::new(SlackRouter::default()), no_delay());

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
            vec![],
        ));

        let runner =
            SocketModeRunner::new(transport.clone(), Arc::new(SlackRouter::default()), no_delay());

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn acknowledges_before_dispatch_and_survives_handler_errors() {
        let handler = CountingCommand::default();
        let mut router = SlackRouter::new();
        router.commands.register("/stats", handler.clone());

        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(stats_command("env-1"))),
                Ok(Some(stats_command("env-2"))),
                Ok(Some(SlackEnvelope::new(
                    "",
                    SlackPayload::Unrecognized { envelope_type: "hello".to_owned() },
                ))),
                Ok(None),
            ],
            vec![],
        ));

        let runner = SocketModeRunner::new(transport.clone(), Arc::new(router), no_delay());
        runner.start().await.expect("runner");

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1", "env-2"]);
        assert_eq!(transport.disconnect_calls().await, 1);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_idle_loop() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = SocketModeRunner::new(
            Arc::new(IdleTransport),
            Arc::new(SlackRouter::default()),
            no_delay(),
        )
        .with_shutdown(shutdown_rx);

        let handle = tokio::spawn(async move { runner.start().await });
        shutdown_tx.send(true).expect("send shutdown");

        handle.await.expect("join").expect("runner exits cleanly");
    }

    #[tokio::test]
    async fn pre_signalled_shutdown_never_connects() {
        let transport = Arc::new(ScriptedTransport::default());
        let (_shutdown_tx, shutdown_rx) = watch::channel(true);

        let runner =
            SocketModeRunner::new(transport.clone(), Arc::new(SlackRouter::default()), no_delay())
                .with_shutdown(shutdown_rx);
        runner.start().await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 0);
    }
}
