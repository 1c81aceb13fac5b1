//! Outbound seam to the messaging platform.

use async_trait::async_trait;

use crate::error::ChannelError;

/// The two writes the pipeline may perform on a platform.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Platform name for logs.
    fn name(&self) -> &str;

    /// Post a new message. Returns the platform's id for the message.
    async fn post(&self, channel_id: &str, text: &str) -> Result<String, ChannelError>;

    /// Replace the text of a message previously returned by `post`.
    async fn edit(&self, channel_id: &str, message_id: &str, text: &str)
    -> Result<(), ChannelError>;
}
