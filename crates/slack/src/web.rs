use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tars_core::config::SlackConfig;
use tars_core::domain::message::{format_slack_ts, ChannelMessage, ReactionCount};
use tracing::{debug, warn};

use crate::api::{ApiError, FileUpload, HistoryPage, MessagingApi};
use crate::blocks::{MessageTemplate, ModalView};

const HISTORY_PAGE_LIMIT: u32 = 200;

/// `MessagingApi` over the Slack Web API.
pub struct SlackWebClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(config: &SlackConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|error| ApiError::Http {
                method: "client.build".to_owned(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call_form(&self, method: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .form(params)
            .send()
            .await
            .map_err(|error| http_error(method, error))?;
        read_response(method, response).await
    }

    async fn call_json(&self, method: &str, body: Value) -> Result<Value, ApiError> {
        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| http_error(method, error))?;
        read_response(method, response).await
    }
}

fn http_error(method: &str, error: reqwest::Error) -> ApiError {
    ApiError::Http { method: method.to_owned(), reason: error.to_string() }
}

async fn read_response(method: &str, response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    if !status.is_success() {
        warn!(method, status = %status, "slack web api returned non-success status");
        return Err(ApiError::Http { method: method.to_owned(), reason: format!("status {status}") });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|error| ApiError::Decode { method: method.to_owned(), reason: error.to_string() })?;
    check_ok(method, body)
}

/// Slack reports failures as `200 {"ok": false, "error": "..."}`.
pub fn check_ok(method: &str, body: Value) -> Result<Value, ApiError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }

    let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error").to_owned();
    Err(ApiError::Slack { method: method.to_owned(), error })
}

#[derive(Deserialize)]
struct WireHistory {
    #[serde(default)]
    messages: Vec<WireMessage>,
    #[serde(default)]
    response_metadata: Option<WireMetadata>,
}

#[derive(Deserialize)]
struct WireMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize)]
struct WireMessage {
    ts: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    reactions: Vec<WireReaction>,
}

#[derive(Deserialize)]
struct WireReaction {
    name: String,
    #[serde(default)]
    count: i64,
}

#[derive(Deserialize)]
struct WireReactionsItem {
    #[serde(default)]
    message: Option<WireMessage>,
}

impl From<WireMessage> for ChannelMessage {
    fn from(value: WireMessage) -> Self {
        ChannelMessage {
            ts: value.ts,
            user_id: value.user,
            text: value.text,
            reactions: value.reactions.into_iter().map(ReactionCount::from).collect(),
        }
    }
}

impl From<WireReaction> for ReactionCount {
    fn from(value: WireReaction) -> Self {
        ReactionCount::new(value.name, value.count)
    }
}

fn decode<T>(method: &str, body: Value) -> Result<T, ApiError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(body)
        .map_err(|error| ApiError::Decode { method: method.to_owned(), reason: error.to_string() })
}

pub fn parse_history_response(body: Value) -> Result<HistoryPage, ApiError> {
    let history: WireHistory = decode("conversations.history", body)?;
    let next_cursor = history
        .response_metadata
        .map(|metadata| metadata.next_cursor)
        .filter(|cursor| !cursor.is_empty());

    Ok(HistoryPage {
        messages: history.messages.into_iter().map(ChannelMessage::from).collect(),
        next_cursor,
    })
}

pub fn parse_reactions_response(body: Value) -> Result<Vec<ReactionCount>, ApiError> {
    let item: WireReactionsItem = decode("reactions.get", body)?;
    Ok(item
        .message
        .map(|message| message.reactions.into_iter().map(ReactionCount::from).collect())
        .unwrap_or_default())
}

fn string_field(method: &str, body: &Value, pointer: &str) -> Result<String, ApiError> {
    body.pointer(pointer).and_then(Value::as_str).map(str::to_owned).ok_or_else(|| {
        ApiError::Decode { method: method.to_owned(), reason: format!("missing `{pointer}`") }
    })
}

#[async_trait]
impl MessagingApi for SlackWebClient {
    async fn conversation_history(
        &self,
        channel_id: &str,
        oldest: DateTime<Utc>,
        latest: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, ApiError> {
        let mut params = vec![
            ("channel", channel_id.to_owned()),
            ("oldest", format_slack_ts(oldest)),
            ("latest", format_slack_ts(latest)),
            ("inclusive", "true".to_owned()),
            ("limit", HISTORY_PAGE_LIMIT.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_owned()));
        }

        let body = self.call_form("conversations.history", &params).await?;
        let page = parse_history_response(body)?;
        debug!(
            channel_id = %channel_id,
            message_count = page.messages.len(),
            has_more = page.next_cursor.is_some(),
            "fetched conversation history page"
        );
        Ok(page)
    }

    async fn reactions(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<Vec<ReactionCount>, ApiError> {
        let params = [
            ("channel", channel_id.to_owned()),
            ("timestamp", message_ts.to_owned()),
            ("full", "true".to_owned()),
        ];
        let body = self.call_form("reactions.get", &params).await?;
        parse_reactions_response(body)
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<String, ApiError> {
        let body = self
            .call_json(
                "chat.postMessage",
                json!({
                    "channel": channel_id,
                    "text": message.fallback_text,
                    "blocks": message.blocks,
                }),
            )
            .await?;
        string_field("chat.postMessage", &body, "/ts")
    }

    async fn post_ephemeral(
        &self,
        channel_id: &str,
        user_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), ApiError> {
        self.call_json(
            "chat.postEphemeral",
            json!({
                "channel": channel_id,
                "user": user_id,
                "text": message.fallback_text,
                "blocks": message.blocks,
            }),
        )
        .await?;
        Ok(())
    }

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), ApiError> {
        self.call_json("views.open", json!({ "trigger_id": trigger_id, "view": view })).await?;
        Ok(())
    }

    async fn open_direct_message(&self, user_id: &str) -> Result<String, ApiError> {
        let body = self.call_form("conversations.open", &[("users", user_id.to_owned())]).await?;
        string_field("conversations.open", &body, "/channel/id")
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<(), ApiError> {
        let ticket = self
            .call_form(
                "files.getUploadURLExternal",
                &[("filename", upload.filename.clone()), ("length", upload.bytes.len().to_string())],
            )
            .await?;
        let upload_url = string_field("files.getUploadURLExternal", &ticket, "/upload_url")?;
        let file_id = string_field("files.getUploadURLExternal", &ticket, "/file_id")?;

        let response = self
            .http
            .post(&upload_url)
            .body(upload.bytes)
            .send()
            .await
            .map_err(|error| http_error("files.upload", error))?;
        if !response.status().is_success() {
            return Err(ApiError::Http {
                method: "files.upload".to_owned(),
                reason: format!("status {}", response.status()),
            });
        }

        let mut completion = json!({
            "files": [{ "id": file_id, "title": upload.title }],
            "channel_id": upload.channel_id,
        });
        if let Some(comment) = upload.initial_comment {
            completion["initial_comment"] = Value::String(comment);
        }
        self.call_json("files.completeUploadExternal", completion).await?;
        Ok(())
    }
}
