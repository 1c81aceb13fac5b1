//! Slack channel — Socket Mode WebSocket for inbound events, Web API for replies.
//!
//! Inbound: `apps.connections.open` → WebSocket, every envelope ACKed before
//! it is handled, each routed event handled on its own task. Outbound:
//! `chat.postMessage` and `chat.update` through `MessagingPlatform`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::channels::MessagingPlatform;
use crate::config::SlackConfig;
use crate::error::ChannelError;
use crate::pipeline::{ChannelType, InboundEvent, MessageProcessor};

/// Slack Web API base URL.
const SLACK_API_BASE: &str = "https://slack.com/api";

/// Base reconnect delay; grows linearly with consecutive failures.
const RECONNECT_DELAY_SECS: u64 = 5;

/// Upper bound on the reconnect delay.
const MAX_RECONNECT_DELAY_SECS: u64 = 60;

/// Reconnect if the socket is silent this long (Slack pings far more often).
const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Slack error codes that retrying cannot fix.
const FATAL_AUTH_ERRORS: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "not_allowed_token_type",
    "account_inactive",
    "token_revoked",
];

// ── Socket Mode types ───────────────────────────────────────────────

/// Socket Mode envelope received from Slack.
#[derive(Debug, Deserialize)]
struct SocketEnvelope {
    /// Must be ACKed immediately. Absent on `hello` and `disconnect`.
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Value,
    /// Present on `disconnect`.
    #[serde(default)]
    reason: Option<String>,
}

/// The `event` object of an `events_api` payload.
#[derive(Debug, Deserialize)]
struct SlackEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    channel_type: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// An event matched to one of the two registered handlers.
#[derive(Debug, Clone)]
pub enum RoutedEvent {
    DirectMessage(InboundEvent),
    Mention(InboundEvent),
}

/// What a single WebSocket text frame means.
#[derive(Debug)]
enum SocketFrame {
    Hello,
    Disconnect(String),
    Envelope {
        ack: Option<String>,
        routed: Option<RoutedEvent>,
    },
}

fn channel_type_from(raw: Option<&str>) -> ChannelType {
    match raw {
        Some("im") => ChannelType::DirectMessage,
        Some("channel" | "group" | "mpim") => ChannelType::Channel,
        _ => ChannelType::Other,
    }
}

/// Route an `events_api` payload to a handler.
///
/// `message` events reach the DM handler only from `im` channels;
/// `app_mention` events reach the mention handler. Everything else, and any
/// event without a channel to reply into, is dropped here.
pub fn route_payload(payload: &Value) -> Option<RoutedEvent> {
    let event: SlackEvent = serde_json::from_value(payload.get("event")?.clone()).ok()?;
    let channel_id = event.channel?;
    let channel_type = channel_type_from(event.channel_type.as_deref());

    let inbound = InboundEvent {
        channel_id,
        channel_type,
        author_id: event.user,
        is_from_automation: event.bot_id.is_some(),
        subtype: event.subtype,
        text: event.text.unwrap_or_default(),
        event_id: payload
            .get("event_id")
            .and_then(Value::as_str)
            .map(String::from),
    };

    match event.kind.as_str() {
        "message" if channel_type == ChannelType::DirectMessage => {
            Some(RoutedEvent::DirectMessage(inbound))
        }
        "app_mention" => Some(RoutedEvent::Mention(inbound)),
        _ => None,
    }
}

fn parse_frame(text: &str) -> Result<SocketFrame, ChannelError> {
    let envelope: SocketEnvelope = serde_json::from_str(text)
        .map_err(|e| ChannelError::InvalidMessage(format!("Socket Mode frame: {e}")))?;

    Ok(match envelope.envelope_type.as_str() {
        "hello" => SocketFrame::Hello,
        "disconnect" => {
            SocketFrame::Disconnect(envelope.reason.unwrap_or_else(|| "unknown".into()))
        }
        "events_api" => SocketFrame::Envelope {
            ack: envelope.envelope_id,
            routed: route_payload(&envelope.payload),
        },
        other => {
            debug!(envelope_type = %other, "Ignoring non-events_api envelope");
            SocketFrame::Envelope {
                ack: envelope.envelope_id,
                routed: None,
            }
        }
    })
}

/// Consecutive connection failures, driving the reconnect delay.
#[derive(Debug, Default)]
struct Backoff {
    failures: u32,
}

impl Backoff {
    /// Zero after a clean connection; linear in failures after that, capped.
    fn delay(&self) -> Duration {
        Duration::from_secs(
            (RECONNECT_DELAY_SECS * u64::from(self.failures)).min(MAX_RECONNECT_DELAY_SECS),
        )
    }

    fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

fn is_fatal_auth_error(err: &ChannelError) -> bool {
    matches!(err, ChannelError::Api { code, .. } if FATAL_AUTH_ERRORS.contains(&code.as_str()))
}

// ── SlackChannel ────────────────────────────────────────────────────

/// Slack channel using Socket Mode + Web API.
pub struct SlackChannel {
    bot_token: SecretString,
    app_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(config: &SlackConfig) -> Self {
        Self {
            bot_token: config.bot_token.clone(),
            app_token: config.app_token.clone(),
            api_base: SLACK_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point Web API calls somewhere other than slack.com.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    /// Call a Web API method and return the body if Slack reports `ok`.
    async fn call_api(
        &self,
        method: &str,
        token: &SecretString,
        body: Option<Value>,
    ) -> Result<Value, ChannelError> {
        let mut request = self
            .client
            .post(self.api_url(method))
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request.send().await.map_err(|e| ChannelError::SendFailed {
            name: "slack".into(),
            reason: format!("{method}: {e}"),
        })?;

        let status = resp.status();
        let data: Value = resp.json().await.map_err(|e| ChannelError::SendFailed {
            name: "slack".into(),
            reason: format!("{method} returned {status} with unreadable body: {e}"),
        })?;

        if data.get("ok").and_then(Value::as_bool) != Some(true) {
            let code = data
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(ChannelError::Api {
                name: "slack".into(),
                method: method.to_string(),
                code: code.to_string(),
            });
        }

        Ok(data)
    }

    /// Call `apps.connections.open` to get a WebSocket URL for Socket Mode.
    async fn open_socket_url(&self) -> Result<String, ChannelError> {
        let data = self
            .call_api("apps.connections.open", &self.app_token, None)
            .await?;

        data.get("url")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ChannelError::StartupFailed {
                name: "slack".into(),
                reason: "no url in apps.connections.open response".into(),
            })
    }

    /// Run the Socket Mode loop forever, reconnecting on every disconnect.
    ///
    /// Returns only when Slack rejects the app token outright.
    pub async fn run(self: Arc<Self>, processor: Arc<MessageProcessor>) -> Result<(), ChannelError> {
        let mut backoff = Backoff::default();

        loop {
            let delay = backoff.delay();
            if !delay.is_zero() {
                info!(
                    attempt = backoff.failures,
                    delay_secs = delay.as_secs(),
                    "Reconnecting to Slack Socket Mode"
                );
                tokio::time::sleep(delay).await;
            }

            let url = match self.open_socket_url().await {
                Ok(url) => url,
                Err(e) if is_fatal_auth_error(&e) => return Err(e),
                Err(e) => {
                    error!(error = %e, "Failed to get Socket Mode URL");
                    backoff.record_failure();
                    continue;
                }
            };

            match self.listen(&url, &processor, &mut backoff).await {
                // Slack asked for a refresh; the next URL is good immediately.
                Ok(()) => backoff.reset(),
                Err(e) => {
                    warn!(error = %e, "Slack Socket Mode connection lost");
                    backoff.record_failure();
                }
            }
        }
    }

    /// Serve one WebSocket connection until it closes.
    ///
    /// `Ok` means Slack sent `disconnect`; every other ending is an error.
    /// The backoff is reset once Slack says `hello`.
    async fn listen(
        &self,
        url: &str,
        processor: &Arc<MessageProcessor>,
        backoff: &mut Backoff,
    ) -> Result<(), ChannelError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            ChannelError::Disconnected {
                name: "slack".into(),
                reason: format!("connect failed: {e}"),
            }
        })?;
        info!("Connected to Slack Socket Mode");

        let (mut write, mut read) = ws_stream.split();

        loop {
            let frame = match tokio::time::timeout(IDLE_TIMEOUT, read.next()).await {
                Ok(frame) => frame,
                Err(_) => {
                    return Err(ChannelError::Disconnected {
                        name: "slack".into(),
                        reason: format!("no traffic for {}s", IDLE_TIMEOUT.as_secs()),
                    });
                }
            };

            match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let parsed = match parse_frame(&text) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            warn!(error = %e, "Unparseable Socket Mode frame");
                            continue;
                        }
                    };

                    match parsed {
                        SocketFrame::Hello => {
                            info!("Socket Mode hello received");
                            backoff.reset();
                        }
                        // Socket Mode was switched off for the app; back off like any failure.
                        SocketFrame::Disconnect(reason) if reason == "link_disabled" => {
                            return Err(ChannelError::Disconnected {
                                name: "slack".into(),
                                reason,
                            });
                        }
                        SocketFrame::Disconnect(reason) => {
                            info!(reason = %reason, "Slack requested disconnect");
                            return Ok(());
                        }
                        SocketFrame::Envelope { ack, routed } => {
                            // ACK first: Slack redelivers anything not ACKed within 3s.
                            if let Some(envelope_id) = ack {
                                let ack = json!({ "envelope_id": envelope_id }).to_string();
                                write.send(WsMessage::Text(ack.into())).await.map_err(|e| {
                                    ChannelError::Disconnected {
                                        name: "slack".into(),
                                        reason: format!("ACK failed: {e}"),
                                    }
                                })?;
                            }
                            if let Some(routed) = routed {
                                spawn_handler(Arc::clone(processor), routed);
                            }
                        }
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    return Err(ChannelError::Disconnected {
                        name: "slack".into(),
                        reason: format!("closed by server: {frame:?}"),
                    });
                }
                None => {
                    return Err(ChannelError::Disconnected {
                        name: "slack".into(),
                        reason: "stream ended".into(),
                    });
                }
                Some(Err(e)) => {
                    return Err(ChannelError::Disconnected {
                        name: "slack".into(),
                        reason: e.to_string(),
                    });
                }
                Some(Ok(_)) => {}
            }
        }
    }
}

/// Handle one event on its own task so slow completions never block the socket.
fn spawn_handler(processor: Arc<MessageProcessor>, routed: RoutedEvent) {
    tokio::spawn(async move {
        match routed {
            RoutedEvent::DirectMessage(event) => {
                processor.handle_message(event).await;
            }
            RoutedEvent::Mention(event) => {
                processor.handle_mention(event).await;
            }
        }
    });
}

#[async_trait]
impl MessagingPlatform for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn post(&self, channel_id: &str, text: &str) -> Result<String, ChannelError> {
        let data = self
            .call_api(
                "chat.postMessage",
                &self.bot_token,
                Some(json!({ "channel": channel_id, "text": text })),
            )
            .await?;

        data.get("ts")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ChannelError::SendFailed {
                name: "slack".into(),
                reason: "chat.postMessage response has no ts".into(),
            })
    }

    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<(), ChannelError> {
        self.call_api(
            "chat.update",
            &self.bot_token,
            Some(json!({ "channel": channel_id, "ts": message_id, "text": text })),
        )
        .await?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
