use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tars_core::domain::stats::DailyTallies;
use tars_core::errors::ApplicationError;
use tars_core::flows::{FlowAction, FlowEvent, FlowState, FlowType, StatsFlow};
use tars_core::interval::StatsInterval;
use tars_core::stats::StatsProcessor;
use tars_db::StatsRepository;
use tars_slack::api::{collect_history, FileUpload, MessagingApi};
use tars_slack::blocks::{
    channel_not_configured_message, chart_caption, error_message, help_message, interval_modal,
    no_stats_message, stats_summary_message, MessageTemplate, CHANNEL_ACTION_ID, CHANNEL_BLOCK_ID,
    END_DATE_ACTION_ID, END_DATE_BLOCK_ID, START_DATE_ACTION_ID, START_DATE_BLOCK_ID,
};
use tars_slack::commands::{parse_stats_command, SlashCommandPayload, StatsCommand, STATS_COMMAND};
use tars_slack::events::{EventPayload, EventType};
use tars_slack::interactive::{InteractionKind, InteractionPayload};
use tars_slack::registry::{EventContext, Handler, HandlerOutcome, SlackRouter};
use tracing::{debug, error, info, warn};

use crate::chart::{chart_file_name, ChartRenderer, PieChartRequest};

pub const DEFAULT_STATS_DAYS: u32 = 7;

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Drives the pull/draw interval workflows and the `/stats` command against Slack and the
/// stats repository.
pub struct StatsBot {
    api: Arc<dyn MessagingApi>,
    repository: Arc<dyn StatsRepository>,
    processor: StatsProcessor,
    chart_renderer: Option<Arc<dyn ChartRenderer>>,
    clock: Arc<dyn Clock>,
    default_stats_days: u32,
}

impl StatsBot {
    pub fn new(
        api: Arc<dyn MessagingApi>,
        repository: Arc<dyn StatsRepository>,
        processor: StatsProcessor,
    ) -> Self {
        Self {
            api,
            repository,
            processor,
            chart_renderer: None,
            clock: Arc::new(SystemClock),
            default_stats_days: DEFAULT_STATS_DAYS,
        }
    }

    pub fn with_chart_renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.chart_renderer = Some(renderer);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_stats_days(mut self, days: u32) -> Self {
        self.default_stats_days = days;
        self
    }

    pub async fn open_interval_modal(
        &self,
        flow_type: FlowType,
        payload: &InteractionPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, ApplicationError> {
        let flow = StatsFlow::new(flow_type);
        let opened = flow.apply(flow.initial_state(), &FlowEvent::ShortcutInvoked)?;

        for action in &opened.actions {
            if *action == FlowAction::OpenIntervalModal {
                let view = interval_modal(flow_type, self.clock.today());
                self.api.open_view(&payload.trigger_id, &view).await?;
            }
        }

        info!(
            event_name = "flow.stats.modal_opened",
            correlation_id = %ctx.correlation_id,
            flow_type = ?flow_type,
            user_id = %payload.user.id,
            "interval modal opened"
        );
        Ok(HandlerOutcome::Processed)
    }

    pub async fn handle_submission(
        &self,
        flow_type: FlowType,
        payload: &InteractionPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, ApplicationError> {
        let flow = StatsFlow::new(flow_type);
        let user_id = payload.user.id.as_str();

        let Some(channel_id) = selected_channel(payload) else {
            let rejection = ApplicationError::Validation("a channel must be selected".to_owned());
            let message = failure_message(&rejection, ctx);
            return self.reject(&flow, user_id, None, &message, &rejection, ctx).await;
        };

        if !self.processor.rules().contains_channel(&channel_id) {
            let rejection = ApplicationError::Validation(format!(
                "channel {channel_id} is not configured for stats exporting"
            ));
            return self
                .reject(&flow, user_id, None, &channel_not_configured_message(), &rejection, ctx)
                .await;
        }

        let interval = match selected_interval(payload) {
            Ok(interval) => interval,
            Err(rejection) => {
                let message = failure_message(&rejection, ctx);
                return self
                    .reject(&flow, user_id, Some(&channel_id), &message, &rejection, ctx)
                    .await;
            }
        };

        let accepted = flow.apply(FlowState::AwaitingSubmission, &FlowEvent::SubmissionAccepted)?;
        info!(
            event_name = "flow.stats.submission_accepted",
            correlation_id = %ctx.correlation_id,
            flow_type = ?flow_type,
            channel_id = %channel_id,
            interval = %interval.label(),
            user_id = %user_id,
            "interval submission accepted"
        );

        match self.run_actions(&accepted.actions, user_id, &channel_id, &interval, ctx).await {
            Ok(()) => {
                flow.apply(accepted.to, &FlowEvent::ReportDelivered)?;
                info!(
                    event_name = "flow.stats.report_delivered",
                    correlation_id = %ctx.correlation_id,
                    flow_type = ?flow_type,
                    channel_id = %channel_id,
                    "stats report delivered"
                );
                Ok(HandlerOutcome::Processed)
            }
            Err(failure) => {
                let failed = flow.apply(
                    accepted.to,
                    &FlowEvent::ProcessingFailed { reason: failure.to_string() },
                )?;
                error!(
                    event_name = "flow.stats.processing_failed",
                    correlation_id = %ctx.correlation_id,
                    flow_type = ?flow_type,
                    channel_id = %channel_id,
                    error = %failure,
                    "stats processing failed"
                );
                if failed.actions.contains(&FlowAction::NotifyUserOfError) {
                    let message = failure_message(&failure, ctx);
                    if let Err(notify_error) =
                        self.notify_user(user_id, Some(&channel_id), &message).await
                    {
                        warn!(
                            event_name = "flow.stats.notify_failed",
                            correlation_id = %ctx.correlation_id,
                            error = %notify_error,
                            "could not tell the user about the failure"
                        );
                    }
                }
                Err(failure)
            }
        }
    }

    async fn reject(
        &self,
        flow: &StatsFlow,
        user_id: &str,
        channel_id: Option<&str>,
        message: &MessageTemplate,
        rejection: &ApplicationError,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, ApplicationError> {
        let rejected = flow.apply(
            FlowState::AwaitingSubmission,
            &FlowEvent::SubmissionRejected { reason: rejection.to_string() },
        )?;
        warn!(
            event_name = "flow.stats.submission_rejected",
            correlation_id = %ctx.correlation_id,
            flow_type = ?flow.flow_type(),
            user_id = %user_id,
            reason = %rejection,
            "interval submission rejected"
        );

        if rejected.actions.contains(&FlowAction::NotifyUserOfError) {
            self.notify_user(user_id, channel_id, message).await?;
        }
        Ok(HandlerOutcome::Processed)
    }

    async fn run_actions(
        &self,
        actions: &[FlowAction],
        user_id: &str,
        channel_id: &str,
        interval: &StatsInterval,
        ctx: &EventContext,
    ) -> Result<(), ApplicationError> {
        let mut tallies = DailyTallies::new();
        for action in actions {
            match action {
                FlowAction::ProcessChannelHistory => {
                    tallies = self.process_channel_history(channel_id, interval, ctx).await?;
                }
                FlowAction::PersistDailyStats => {
                    self.persist_daily_stats(channel_id, &tallies, ctx).await?;
                }
                FlowAction::SendReport => {
                    self.send_report(user_id, channel_id, interval, ctx).await?;
                }
                FlowAction::OpenIntervalModal | FlowAction::NotifyUserOfError => {}
            }
        }
        Ok(())
    }

    /// Classifies every qualifying message in `interval` into per-day tallies keyed by the
    /// message's UTC day. A reaction lookup failure skips that message only.
    pub async fn process_channel_history(
        &self,
        channel_id: &str,
        interval: &StatsInterval,
        ctx: &EventContext,
    ) -> Result<DailyTallies, ApplicationError> {
        let beacon = self.processor.rules().beacon_reaction(channel_id);
        let messages = collect_history(
            self.api.as_ref(),
            channel_id,
            interval.start_bound(),
            interval.end_bound(),
        )
        .await?;

        let mut tallies = DailyTallies::new();
        let mut processed = 0_usize;
        for message in &messages {
            let Some(posted_at) = message.posted_at() else {
                debug!(ts = %message.ts, "skipping message with unparseable ts");
                continue;
            };
            if !interval.contains(posted_at) {
                continue;
            }
            if !self.processor.should_process_message(beacon, message) {
                continue;
            }

            let reactions = match self.api.reactions(channel_id, &message.ts).await {
                Ok(reactions) => reactions,
                Err(error) => {
                    warn!(
                        event_name = "flow.stats.reactions_unavailable",
                        correlation_id = %ctx.correlation_id,
                        channel_id = %channel_id,
                        ts = %message.ts,
                        error = %error,
                        "skipping message whose reactions could not be fetched"
                    );
                    continue;
                }
            };

            let day = posted_at.date_naive();
            self.processor.classify(channel_id, &reactions, tallies.day_mut(day));
            processed += 1;
        }

        info!(
            event_name = "flow.stats.history_processed",
            correlation_id = %ctx.correlation_id,
            channel_id = %channel_id,
            message_count = messages.len(),
            processed_count = processed,
            day_count = tallies.len(),
            "channel history processed"
        );
        Ok(tallies)
    }

    /// Returns the number of days written.
    pub async fn persist_daily_stats(
        &self,
        channel_id: &str,
        tallies: &DailyTallies,
        ctx: &EventContext,
    ) -> Result<usize, ApplicationError> {
        let mut saved = 0_usize;
        for (day, tally) in tallies.iter() {
            if tally.is_empty() {
                continue;
            }
            self.repository.save_stats(channel_id, *day, tally).await?;
            saved += 1;
        }

        info!(
            event_name = "flow.stats.persisted",
            correlation_id = %ctx.correlation_id,
            channel_id = %channel_id,
            day_count = saved,
            "daily stats persisted"
        );
        Ok(saved)
    }

    pub async fn send_report(
        &self,
        user_id: &str,
        channel_id: &str,
        interval: &StatsInterval,
        ctx: &EventContext,
    ) -> Result<(), ApplicationError> {
        let totals = self
            .repository
            .aggregated_stats(channel_id, interval.start_bound(), interval.end_bound())
            .await?;
        let dm_channel = self.api.open_direct_message(user_id).await?;

        if totals.is_empty() {
            self.api.post_message(&dm_channel, &no_stats_message()).await?;
            debug!(
                correlation_id = %ctx.correlation_id,
                channel_id = %channel_id,
                "no stats stored for interval"
            );
            return Ok(());
        }

        if let Some(renderer) = &self.chart_renderer {
            let request = PieChartRequest::from_totals(interval, &totals);
            let bytes = renderer.render_pie(&request).await?;
            self.api
                .upload_file(FileUpload {
                    channel_id: dm_channel,
                    filename: chart_file_name(),
                    title: request.title,
                    initial_comment: Some(chart_caption(&interval.label())),
                    bytes,
                })
                .await?;
            return Ok(());
        }

        let daily = self
            .repository
            .daily_stats(channel_id, interval.start_bound(), interval.end_bound())
            .await?;
        let summary = stats_summary_message(
            &self.channel_label(channel_id),
            &interval.label(),
            &totals,
            &daily,
        );
        self.api.post_message(&dm_channel, &summary).await?;
        Ok(())
    }

    pub async fn handle_stats_command(
        &self,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, ApplicationError> {
        let reply = match parse_stats_command(payload, self.default_stats_days) {
            Ok(StatsCommand::Help) => help_message(),
            Ok(StatsCommand::Summary { days }) => {
                match self.channel_summary(&payload.channel_id, days).await {
                    Ok(message) => message,
                    Err(failure) => {
                        warn!(
                            event_name = "command.stats.failed",
                            correlation_id = %ctx.correlation_id,
                            channel_id = %payload.channel_id,
                            error = %failure,
                            "stats command failed"
                        );
                        let message = failure_message(&failure, ctx);
                        self.api
                            .post_ephemeral(&payload.channel_id, &payload.user_id, &message)
                            .await?;
                        return Err(failure);
                    }
                }
            }
            Err(invalid) => {
                failure_message(&ApplicationError::Validation(invalid.to_string()), ctx)
            }
        };

        self.api.post_ephemeral(&payload.channel_id, &payload.user_id, &reply).await?;
        Ok(HandlerOutcome::Processed)
    }

    async fn channel_summary(
        &self,
        channel_id: &str,
        days: u32,
    ) -> Result<MessageTemplate, ApplicationError> {
        if !self.processor.rules().contains_channel(channel_id) {
            return Ok(channel_not_configured_message());
        }

        let interval = StatsInterval::trailing_days(self.clock.today(), days)?;
        let totals = self
            .repository
            .aggregated_stats(channel_id, interval.start_bound(), interval.end_bound())
            .await?;
        if totals.is_empty() {
            return Ok(no_stats_message());
        }

        let daily = self
            .repository
            .daily_stats(channel_id, interval.start_bound(), interval.end_bound())
            .await?;
        let channel_label = self.channel_label(channel_id);
        Ok(stats_summary_message(&channel_label, &interval.label(), &totals, &daily))
    }

    pub async fn handle_event(
        &self,
        event: &EventPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, ApplicationError> {
        match event {
            EventPayload::AppMention(mention) => {
                self.api.post_message(&mention.channel, &help_message()).await?;
                Ok(HandlerOutcome::Processed)
            }
            EventPayload::ReactionAdded(reaction) => {
                let rules = self.processor.rules();
                if !rules.contains_channel(&reaction.item.channel) {
                    return Ok(HandlerOutcome::Ignored);
                }
                debug!(
                    event_name = "slack.reaction.observed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %reaction.item.channel,
                    reaction = %reaction.reaction,
                    category = rules
                        .category_for(&reaction.item.channel, &reaction.reaction)
                        .unwrap_or("unmatched"),
                    "reaction added in configured channel"
                );
                Ok(HandlerOutcome::Processed)
            }
            _ => Ok(HandlerOutcome::Ignored),
        }
    }

    /// Ephemeral in `channel_id` when given, otherwise a direct message.
    async fn notify_user(
        &self,
        user_id: &str,
        channel_id: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<(), ApplicationError> {
        match channel_id {
            Some(channel_id) => self.api.post_ephemeral(channel_id, user_id, message).await?,
            None => {
                let dm_channel = self.api.open_direct_message(user_id).await?;
                self.api.post_message(&dm_channel, message).await?;
            }
        }
        Ok(())
    }

    fn channel_label(&self, channel_id: &str) -> String {
        match self
            .processor
            .rules()
            .channel(channel_id)
            .map(|channel| channel.name.as_str())
            .filter(|name| !name.is_empty())
        {
            Some(name) => format!("#{name}"),
            None => format!("<#{channel_id}>"),
        }
    }
}

fn selected_channel(payload: &InteractionPayload) -> Option<String> {
    let value = payload.view_value(CHANNEL_BLOCK_ID, CHANNEL_ACTION_ID)?;
    value
        .selected_channel
        .clone()
        .or_else(|| value.selected_conversation.clone())
        .filter(|channel| !channel.trim().is_empty())
}

fn selected_interval(payload: &InteractionPayload) -> Result<StatsInterval, ApplicationError> {
    let start = selected_date(payload, START_DATE_BLOCK_ID, START_DATE_ACTION_ID)
        .ok_or_else(|| ApplicationError::Validation("a start date must be selected".to_owned()))?;
    let end = selected_date(payload, END_DATE_BLOCK_ID, END_DATE_ACTION_ID)
        .ok_or_else(|| ApplicationError::Validation("an end date must be selected".to_owned()))?;
    StatsInterval::parse(start, end)
}

fn selected_date<'a>(
    payload: &'a InteractionPayload,
    block_id: &str,
    action_id: &str,
) -> Option<&'a str> {
    payload
        .view_value(block_id, action_id)?
        .selected_date
        .as_deref()
        .filter(|date| !date.trim().is_empty())
}

fn failure_message(failure: &ApplicationError, ctx: &EventContext) -> MessageTemplate {
    error_message(&failure.clone().into_interface(ctx.correlation_id.clone()))
}

/// Both interval workflows share handlers; the flow comes from the payload's callback id.
fn flow_for(payload: &InteractionPayload) -> Option<FlowType> {
    FlowType::from_callback_id(payload.routing_key())
}

struct OpenIntervalModal {
    bot: Arc<StatsBot>,
}

#[async_trait]
impl Handler<InteractionPayload> for OpenIntervalModal {
    async fn handle(
        &self,
        payload: &InteractionPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, ApplicationError> {
        let Some(flow_type) = flow_for(payload) else {
            return Ok(HandlerOutcome::Ignored);
        };
        self.bot.open_interval_modal(flow_type, payload, ctx).await
    }
}

struct IntervalSubmission {
    bot: Arc<StatsBot>,
}

#[async_trait]
impl Handler<InteractionPayload> for IntervalSubmission {
    async fn handle(
        &self,
        payload: &InteractionPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, ApplicationError> {
        let Some(flow_type) = flow_for(payload) else {
            return Ok(HandlerOutcome::Ignored);
        };
        self.bot.handle_submission(flow_type, payload, ctx).await
    }
}

struct StatsCommandHandler {
    bot: Arc<StatsBot>,
}

#[async_trait]
impl Handler<SlashCommandPayload> for StatsCommandHandler {
    async fn handle(
        &self,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, ApplicationError> {
        self.bot.handle_stats_command(payload, ctx).await
    }
}

struct EventHandler {
    bot: Arc<StatsBot>,
}

#[async_trait]
impl Handler<EventPayload> for EventHandler {
    async fn handle(
        &self,
        payload: &EventPayload,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, ApplicationError> {
        self.bot.handle_event(payload, ctx).await
    }
}

/// Wires both interval workflows, `/stats`, mentions and reaction logging into `router`.
pub fn register_handlers(bot: &Arc<StatsBot>, router: &mut SlackRouter) {
    for flow_type in [FlowType::PullStats, FlowType::DrawStats] {
        router.interactive.register(
            InteractionKind::Shortcut,
            flow_type.shortcut_callback_id(),
            OpenIntervalModal { bot: Arc::clone(bot) },
        );
        router.interactive.register(
            InteractionKind::ViewSubmission,
            flow_type.modal_callback_id(),
            IntervalSubmission { bot: Arc::clone(bot) },
        );
    }
    router.commands.register(STATS_COMMAND, StatsCommandHandler { bot: Arc::clone(bot) });
    router.events.register(EventType::AppMention, EventHandler { bot: Arc::clone(bot) });
    router.events.register(EventType::ReactionAdded, EventHandler { bot: Arc::clone(bot) });
}
