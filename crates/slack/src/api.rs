use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tars_core::domain::message::{ChannelMessage, ReactionCount};
use tars_core::errors::ApplicationError;
use thiserror::Error;

use crate::blocks::{MessageTemplate, ModalView};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("http request to `{method}` failed: {reason}")]
    Http { method: String, reason: String },
    #[error("slack rejected `{method}`: {error}")]
    Slack { method: String, error: String },
    #[error("could not decode `{method}` response: {reason}")]
    Decode { method: String, reason: String },
}

impl From<ApiError> for ApplicationError {
    fn from(value: ApiError) -> Self {
        ApplicationError::Transport(value.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryPage {
    pub messages: Vec<ChannelMessage>,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileUpload {
    pub channel_id: String,
    pub filename: String,
    pub title: String,
    pub initial_comment: Option<String>,
    pub bytes: Vec<u8>,
}

/// The Slack Web API surface the bot relies on.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn conversation_history(
        &self,
        channel_id: &str,
        oldest: DateTime<Utc>,
        latest: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, ApiError>;

    async fn reactions(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<Vec<ReactionCount>, ApiError>;

    /// Returns the posted message's ts.
    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<String, ApiError>;

    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), ApiError>;

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), ApiError>;

    /// Opens (or reuses) the direct message conversation with `user_id`.
    async fn open_direct_message(&self, user_id: &str) -> Result<String, ApiError>;

    async fn upload_file(&self, upload: FileUpload) -> Result<(), ApiError>;
}

/// Drains every history page between `oldest` and `latest`.
pub async fn collect_history(
    api: &dyn MessagingApi,
    channel_id: &str,
    oldest: DateTime<Utc>,
    latest: DateTime<Utc>,
) -> Result<Vec<ChannelMessage>, ApiError> {
    let mut messages = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = api.conversation_history(channel_id, oldest, latest, cursor.as_deref()).await?;
        messages.extend(page.messages);

        match page.next_cursor.filter(|next| !next.is_empty()) {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => break,
        }
    }

    tracing::debug!(
        event_name = "slack.history.collected",
        channel_id = %channel_id,
        message_count = messages.len(),
        "collected channel history"
    );
    Ok(messages)
}
