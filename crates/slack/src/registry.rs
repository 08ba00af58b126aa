use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tars_core::errors::ApplicationError;
use thiserror::Error;
use tracing::{debug, info};

use crate::commands::SlashCommandPayload;
use crate::events::{EventPayload, EventType, SlackEnvelope, SlackPayload};
use crate::interactive::{InteractionKind, InteractionPayload};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into() }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    Processed,
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegistryFamily {
    Events,
    Commands,
    Interactive,
}

impl fmt::Display for RegistryFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Events => "events",
            Self::Commands => "commands",
            Self::Interactive => "interactive",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no {family} handler registered for `{key}`")]
    NoHandlerRegistered { family: RegistryFamily, key: String },
    #[error("`{kind}` interaction carries no callback id")]
    MissingCallbackId { kind: InteractionKind },
    #[error(transparent)]
    Handler(#[from] ApplicationError),
}

/// A single routed handler for payloads of type `P`.
#[async_trait]
pub trait Handler<P>: Send + Sync
where
    P: Send + Sync,
{
    async fn handle(&self, payload: &P, ctx: &EventContext)
        -> Result<HandlerOutcome, ApplicationError>;
}

type SharedHandler<P> = Arc<dyn Handler<P>>;

/// Events keyed by event type.
#[derive(Default)]
pub struct EventRegistry {
    handlers: HashMap<EventType, SharedHandler<EventPayload>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any handler already registered for `event_type`.
    pub fn register<H>(&mut self, event_type: EventType, handler: H)
    where
        H: Handler<EventPayload> + 'static,
    {
        debug!(family = %RegistryFamily::Events, key = %event_type, "registered handler");
        self.handlers.insert(event_type, Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        event: &EventPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, DispatchError> {
        let key = event.event_type();
        let Some(handler) = self.handlers.get(&key) else {
            return Err(DispatchError::NoHandlerRegistered {
                family: RegistryFamily::Events,
                key: key.to_string(),
            });
        };

        info!(
            event_name = "dispatch.slack.handler_selected",
            family = %RegistryFamily::Events,
            kind = %key,
            key = %key,
            correlation_id = %ctx.correlation_id,
            "dispatching event"
        );
        handler.handle(event, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Slash commands keyed by command name, e.g. `/stats`.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, SharedHandler<SlashCommandPayload>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, command: impl Into<String>, handler: H)
    where
        H: Handler<SlashCommandPayload> + 'static,
    {
        let command = command.into();
        debug!(family = %RegistryFamily::Commands, key = %command, "registered handler");
        self.handlers.insert(command, Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        command: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, DispatchError> {
        let Some(handler) = self.handlers.get(&command.command) else {
            return Err(DispatchError::NoHandlerRegistered {
                family: RegistryFamily::Commands,
                key: command.command.clone(),
            });
        };

        info!(
            event_name = "dispatch.slack.handler_selected",
            family = %RegistryFamily::Commands,
            kind = "slash_command",
            key = %command.command,
            correlation_id = %ctx.correlation_id,
            "dispatching slash command"
        );
        handler.handle(command, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Interactive payloads keyed by interaction kind and callback key.
#[derive(Default)]
pub struct InteractiveRegistry {
    handlers: HashMap<(InteractionKind, String), SharedHandler<InteractionPayload>>,
}

impl InteractiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, kind: InteractionKind, callback_id: impl Into<String>, handler: H)
    where
        H: Handler<InteractionPayload> + 'static,
    {
        let callback_id = callback_id.into();
        debug!(
            family = %RegistryFamily::Interactive,
            kind = %kind,
            key = %callback_id,
            "registered handler"
        );
        self.handlers.insert((kind, callback_id), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        payload: &InteractionPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, DispatchError> {
        let key = payload.routing_key();
        if key.is_empty() {
            return Err(DispatchError::MissingCallbackId { kind: payload.kind.clone() });
        }

        let Some(handler) = self.handlers.get(&(payload.kind.clone(), key.to_owned())) else {
            return Err(DispatchError::NoHandlerRegistered {
                family: RegistryFamily::Interactive,
                key: format!("{}:{key}", payload.kind),
            });
        };

        info!(
            event_name = "dispatch.slack.handler_selected",
            family = %RegistryFamily::Interactive,
            kind = %payload.kind,
            key = %key,
            correlation_id = %ctx.correlation_id,
            user_id = %payload.user.id,
            "dispatching interactive payload"
        );
        handler.handle(payload, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Routes a decoded envelope to the registry for its payload family.
#[derive(Default)]
pub struct SlackRouter {
    pub events: EventRegistry,
    pub commands: CommandRegistry,
    pub interactive: InteractiveRegistry,
}

impl SlackRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, DispatchError> {
        match &envelope.payload {
            SlackPayload::Event(event) => self.events.dispatch(event, ctx).await,
            SlackPayload::SlashCommand(command) => self.commands.dispatch(command, ctx).await,
            SlackPayload::Interactive(payload) => self.interactive.dispatch(payload, ctx).await,
            SlackPayload::Unrecognized { envelope_type } => {
                debug!(
                    envelope_type = %envelope_type,
                    correlation_id = %ctx.correlation_id,
                    "ignoring unrecognized envelope"
                );
                Ok(HandlerOutcome::Ignored)
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.events.handler_count()
            + self.commands.handler_count()
            + self.interactive.handler_count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tars_core::errors::ApplicationError;

    use super::{
        DispatchError, EventContext, EventRegistry, Handler, HandlerOutcome, InteractiveRegistry,
        RegistryFamily, SlackRouter,
    };
    use crate::commands::SlashCommandPayload;
    use crate::events::{EventPayload, EventType, MessageEvent, SlackEnvelope, SlackPayload};
    use crate::interactive::{InteractionKind, InteractionPayload};

    #[derive(Clone, Default)]
    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CountingHandler {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<P> Handler<P> for CountingHandler
    where
        P: Send + Sync,
    {
        async fn handle(
            &self,
            _payload: &P,
            _ctx: &EventContext,
        ) -> Result<HandlerOutcome, ApplicationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApplicationError::Transport("channel_not_found".to_owned()));
            }
            Ok(HandlerOutcome::Processed)
        }
    }

    fn mention() -> EventPayload {
        EventPayload::AppMention(MessageEvent {
            channel: "C1".to_owned(),
            user: Some("U1".to_owned()),
            text: "<@B1> help".to_owned(),
            ts: "1738195200.000100".to_owned(),
            thread_ts: None,
        })
    }

    fn interaction(json: &str) -> InteractionPayload {
        serde_json::from_str(json).expect("valid interaction payload")
    }

    #[tokio::test]
    async fn registered_event_handler_is_invoked_once() {
        let handler = CountingHandler::default();
        let mut registry = EventRegistry::new();
        registry.register(EventType::AppMention, handler.clone());

        let outcome =
            registry.dispatch(&mention(), &EventContext::default()).await.expect("dispatch");

        assert_eq!(outcome, HandlerOutcome::Processed);
        assert_eq!(handler.calls(), 1);
    }

    #[tokio::test]
    async fn unregistered_event_reports_no_handler() {
        let handler = CountingHandler::default();
        let mut registry = EventRegistry::new();
        registry.register(EventType::ReactionAdded, handler.clone());

        let error =
            registry.dispatch(&mention(), &EventContext::default()).await.expect_err("no handler");

        assert_eq!(
            error,
            DispatchError::NoHandlerRegistered {
                family: RegistryFamily::Events,
                key: "app_mention".to_owned()
            }
        );
        assert_eq!(handler.calls(), 0);
    }

    #[tokio::test]
    async fn re_registration_replaces_previous_handler() {
        let first = CountingHandler::default();
        let second = CountingHandler::default();
        let mut registry = InteractiveRegistry::new();
        registry.register(InteractionKind::Shortcut, "pull_stats_for_interval", first.clone());
        registry.register(InteractionKind::Shortcut, "pull_stats_for_interval", second.clone());

        registry
            .dispatch(
                &interaction(r#"{"type":"shortcut","callback_id":"pull_stats_for_interval"}"#),
                &EventContext::default(),
            )
            .await
            .expect("dispatch");

        assert_eq!(first.calls(), 0);
        assert_eq!(second.calls(), 1);
        assert_eq!(registry.handler_count(), 1);
    }

    #[tokio::test]
    async fn interactive_dispatch_uses_kind_and_resolved_key() {
        let submission = CountingHandler::default();
        let mut registry = InteractiveRegistry::new();
        registry.register(
            InteractionKind::ViewSubmission,
            "pull_stats_for_interval_modal",
            submission.clone(),
        );

        registry
            .dispatch(
                &interaction(
                    r#"{"type":"view_submission","view":{"callback_id":"pull_stats_for_interval_modal"}}"#,
                ),
                &EventContext::default(),
            )
            .await
            .expect("dispatch");
        assert_eq!(submission.calls(), 1);

        let wrong_kind = registry
            .dispatch(
                &interaction(r#"{"type":"shortcut","callback_id":"pull_stats_for_interval_modal"}"#),
                &EventContext::default(),
            )
            .await;
        assert!(matches!(wrong_kind, Err(DispatchError::NoHandlerRegistered { .. })));
        assert_eq!(submission.calls(), 1);
    }

    #[tokio::test]
    async fn missing_callback_id_is_distinct_from_unknown_key() {
        let registry = InteractiveRegistry::new();

        let error = registry
            .dispatch(&interaction(r#"{"type":"block_actions","actions":[]}"#), &EventContext::default())
            .await
            .expect_err("missing key");

        assert_eq!(error, DispatchError::MissingCallbackId { kind: InteractionKind::BlockActions });
    }

    #[tokio::test]
    async fn untyped_interaction_falls_through_to_dispatch_errors() {
        let registry = InteractiveRegistry::new();

        let missing = registry
            .dispatch(&interaction("{}"), &EventContext::default())
            .await
            .expect_err("missing key");
        assert_eq!(
            missing,
            DispatchError::MissingCallbackId { kind: InteractionKind::Other(String::new()) }
        );

        let unknown = registry
            .dispatch(&interaction(r#"{"callback_id":"stray"}"#), &EventContext::default())
            .await;
        assert!(matches!(unknown, Err(DispatchError::NoHandlerRegistered { .. })));
    }

    #[tokio::test]
    async fn handler_errors_propagate_through_dispatch() {
        let failing = CountingHandler { fail: true, ..CountingHandler::default() };
        let mut router = SlackRouter::new();
        router.commands.register("/stats", failing.clone());

        let command = SlashCommandPayload {
            command: "/stats".to_owned(),
            text: String::new(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            trigger_id: "t-1".to_owned(),
            response_url: None,
        };
        let error = router
            .dispatch(
                &SlackEnvelope::new("env-1", SlackPayload::SlashCommand(command)),
                &EventContext::new("env-1"),
            )
            .await
            .expect_err("handler failure");

        assert!(matches!(error, DispatchError::Handler(ApplicationError::Transport(_))));
        assert_eq!(failing.calls(), 1);
    }

    #[tokio::test]
    async fn router_ignores_unrecognized_envelopes() {
        let router = SlackRouter::new();
        let outcome = router
            .dispatch(
                &SlackEnvelope::new(
                    "",
                    SlackPayload::Unrecognized { envelope_type: "hello".to_owned() },
                ),
                &EventContext::default(),
            )
            .await
            .expect("ignored");

        assert_eq!(outcome, HandlerOutcome::Ignored);
        assert_eq!(router.handler_count(), 0);
    }
}
