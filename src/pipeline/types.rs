//! Shared types for the intake and dispatch pipeline.

// ── Inbound event ───────────────────────────────────────────────────

/// Kind of conversation an event was posted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    DirectMessage,
    Channel,
    Other,
}

/// One notification from the messaging platform.
///
/// Platform adapters convert their native payloads into this struct. It lives
/// for one handler invocation; only `event_id` outlives it, inside the dedup
/// cache.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub channel_id: String,
    pub channel_type: ChannelType,
    /// Absent for system events.
    pub author_id: Option<String>,
    /// Posted by a bot or integration.
    pub is_from_automation: bool,
    /// Present for non-primary events (edits, joins, bot posts).
    pub subtype: Option<String>,
    /// Raw text, possibly empty.
    pub text: String,
    /// Platform-assigned id used as the de-duplication key.
    pub event_id: Option<String>,
}

impl InboundEvent {
    /// An ordinary user post with no subtype and no event id.
    pub fn new(
        channel_id: impl Into<String>,
        channel_type: ChannelType,
        author_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_type,
            author_id: Some(author_id.into()),
            is_from_automation: false,
            subtype: None,
            text: text.into(),
            event_id: None,
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn from_automation(mut self) -> Self {
        self.is_from_automation = true;
        self
    }
}

// ── Decision ────────────────────────────────────────────────────────

/// Why an event produced no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Edited message, bot post, join, etc.
    Subtype,
    /// No author, or the author is a bot.
    Automation,
    /// The event id was already handled.
    Duplicate,
}

impl IgnoreReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Subtype => "subtype",
            Self::Automation => "automation",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Classifier output for a direct message. First matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Drop silently.
    Ignore(IgnoreReason),
    /// Exact diagnostic command; fixed reply.
    Diagnostic { reply: String },
    /// Canned-topic fast path; fixed reply.
    Canned { reply: String },
    /// Forward the trimmed text to the completion service.
    Model { prompt: String },
}

impl Decision {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignore(_) => "ignore",
            Self::Diagnostic { .. } => "diagnostic",
            Self::Canned { .. } => "canned",
            Self::Model { .. } => "model",
        }
    }
}

// ── Outbound reply ──────────────────────────────────────────────────

/// The single platform write produced for a handled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundReply {
    /// A brand-new message.
    Posted {
        channel_id: String,
        message_id: String,
        text: String,
    },
    /// An edit of a previously posted placeholder.
    Edited {
        channel_id: String,
        message_id: String,
        text: String,
    },
}

impl OutboundReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Posted { text, .. } | Self::Edited { text, .. } => text,
        }
    }
}
