//! Reply dispatcher. Turns a decision into zero or one platform write.
//!
//! Two strategies:
//! - `Direct`: one `post` with the final text.
//! - `PlaceholderThenEdit`: for model-backed replies, `post` a placeholder
//!   before the completion call, then `edit` it with the final text. Fixed
//!   replies never use the placeholder.
//!
//! Platform failures are logged and swallowed; the handler always returns.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, warn};

use crate::channels::MessagingPlatform;
use crate::pipeline::types::OutboundReply;

/// Text of the placeholder message.
pub const PLACEHOLDER_TEXT: &str = "Thinking…";

/// How model-backed replies are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStrategy {
    Direct,
    PlaceholderThenEdit,
}

impl DeliveryStrategy {
    pub fn from_placeholder_flag(enabled: bool) -> Self {
        if enabled {
            Self::PlaceholderThenEdit
        } else {
            Self::Direct
        }
    }
}

/// Delivers replies through a `MessagingPlatform`.
pub struct ReplyDispatcher {
    platform: Arc<dyn MessagingPlatform>,
    strategy: DeliveryStrategy,
}

impl ReplyDispatcher {
    pub fn new(platform: Arc<dyn MessagingPlatform>, strategy: DeliveryStrategy) -> Self {
        Self { platform, strategy }
    }

    /// Post a fixed reply. `None` if the post failed.
    pub async fn deliver(&self, channel_id: &str, text: &str) -> Option<OutboundReply> {
        match self.platform.post(channel_id, text).await {
            Ok(message_id) => Some(OutboundReply::Posted {
                channel_id: channel_id.to_string(),
                message_id,
                text: text.to_string(),
            }),
            Err(e) => {
                error!(
                    platform = %self.platform.name(),
                    channel = %channel_id,
                    error = %e,
                    "Post failed"
                );
                None
            }
        }
    }

    /// Deliver a reply that takes time to produce.
    ///
    /// `reply` runs exactly once. With the placeholder strategy the
    /// placeholder post strictly precedes it and the edit strictly follows it.
    /// If the placeholder itself could not be posted, the final text is posted
    /// as a new message instead.
    pub async fn deliver_generated<F>(&self, channel_id: &str, reply: F) -> Option<OutboundReply>
    where
        F: Future<Output = String>,
    {
        if self.strategy == DeliveryStrategy::Direct {
            let text = reply.await;
            return self.deliver(channel_id, &text).await;
        }

        let placeholder = match self.platform.post(channel_id, PLACEHOLDER_TEXT).await {
            Ok(message_id) => Some(message_id),
            Err(e) => {
                warn!(
                    platform = %self.platform.name(),
                    channel = %channel_id,
                    error = %e,
                    "Placeholder post failed; will post the reply directly"
                );
                None
            }
        };

        let text = reply.await;

        let Some(message_id) = placeholder else {
            return self.deliver(channel_id, &text).await;
        };

        match self.platform.edit(channel_id, &message_id, &text).await {
            Ok(()) => Some(OutboundReply::Edited {
                channel_id: channel_id.to_string(),
                message_id,
                text,
            }),
            Err(e) => {
                error!(
                    platform = %self.platform.name(),
                    channel = %channel_id,
                    message_id = %message_id,
                    error = %e,
                    "Edit failed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ChannelError;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Post(String),
        Edit(String, String),
    }

    /// Platform stub that records calls and can be told to fail.
    #[derive(Default)]
    struct RecordingPlatform {
        calls: Mutex<Vec<Call>>,
        fail_post: bool,
        fail_edit: bool,
    }

    #[async_trait]
    impl MessagingPlatform for RecordingPlatform {
        fn name(&self) -> &str {
            "recording"
        }

        async fn post(&self, _channel_id: &str, text: &str) -> Result<String, ChannelError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call::Post(text.into()));
            if self.fail_post {
                return Err(ChannelError::SendFailed {
                    name: "recording".into(),
                    reason: "boom".into(),
                });
            }
            Ok(format!("ts-{}", calls.len()))
        }

        async fn edit(
            &self,
            _channel_id: &str,
            message_id: &str,
            text: &str,
        ) -> Result<(), ChannelError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Edit(message_id.into(), text.into()));
            if self.fail_edit {
                return Err(ChannelError::SendFailed {
                    name: "recording".into(),
                    reason: "boom".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn direct_posts_once() {
        let platform = Arc::new(RecordingPlatform::default());
        let dispatcher = ReplyDispatcher::new(platform.clone(), DeliveryStrategy::Direct);

        let reply = dispatcher
            .deliver_generated("D1", async { "hello".to_string() })
            .await
            .unwrap();

        assert_eq!(reply.text(), "hello");
        assert!(matches!(reply, OutboundReply::Posted { .. }));
        assert_eq!(*platform.calls.lock().unwrap(), vec![Call::Post("hello".into())]);
    }

    #[tokio::test]
    async fn placeholder_then_edit_ordering() {
        let platform = Arc::new(RecordingPlatform::default());
        let dispatcher =
            ReplyDispatcher::new(platform.clone(), DeliveryStrategy::PlaceholderThenEdit);

        let observed = platform.clone();
        let reply = dispatcher
            .deliver_generated("D1", async move {
                // The placeholder is already out by the time the reply is produced.
                assert_eq!(observed.calls.lock().unwrap().len(), 1);
                "final".to_string()
            })
            .await
            .unwrap();

        assert_eq!(
            *platform.calls.lock().unwrap(),
            vec![
                Call::Post(PLACEHOLDER_TEXT.into()),
                Call::Edit("ts-1".into(), "final".into()),
            ]
        );
        assert_eq!(
            reply,
            OutboundReply::Edited {
                channel_id: "D1".into(),
                message_id: "ts-1".into(),
                text: "final".into(),
            }
        );
    }

    #[tokio::test]
    async fn fixed_reply_skips_placeholder() {
        let platform = Arc::new(RecordingPlatform::default());
        let dispatcher =
            ReplyDispatcher::new(platform.clone(), DeliveryStrategy::PlaceholderThenEdit);

        dispatcher.deliver("D1", "BRAND-OK-123").await.unwrap();
        assert_eq!(
            *platform.calls.lock().unwrap(),
            vec![Call::Post("BRAND-OK-123".into())]
        );
    }

    #[tokio::test]
    async fn failed_post_is_swallowed() {
        let platform = Arc::new(RecordingPlatform {
            fail_post: true,
            ..Default::default()
        });
        let dispatcher = ReplyDispatcher::new(platform, DeliveryStrategy::Direct);
        assert!(dispatcher.deliver("D1", "hi").await.is_none());
    }

    #[tokio::test]
    async fn failed_edit_is_swallowed() {
        let platform = Arc::new(RecordingPlatform {
            fail_edit: true,
            ..Default::default()
        });
        let dispatcher = ReplyDispatcher::new(platform, DeliveryStrategy::PlaceholderThenEdit);
        let reply = dispatcher
            .deliver_generated("D1", async { "final".to_string() })
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn failed_placeholder_falls_back_to_post() {
        let platform = Arc::new(RecordingPlatform {
            fail_post: true,
            ..Default::default()
        });
        let dispatcher =
            ReplyDispatcher::new(platform.clone(), DeliveryStrategy::PlaceholderThenEdit);
        let mut generated = 0;
        let reply = dispatcher
            .deliver_generated("D1", async {
                generated += 1;
                "final".to_string()
            })
            .await;

        // Both posts fail here, but the reply was still produced only once.
        assert!(reply.is_none());
        assert_eq!(generated, 1);
        assert_eq!(
            *platform.calls.lock().unwrap(),
            vec![Call::Post(PLACEHOLDER_TEXT.into()), Call::Post("final".into())]
        );
    }

    #[test]
    fn strategy_from_flag() {
        assert_eq!(
            DeliveryStrategy::from_placeholder_flag(true),
            DeliveryStrategy::PlaceholderThenEdit
        );
        assert_eq!(
            DeliveryStrategy::from_placeholder_flag(false),
            DeliveryStrategy::Direct
        );
    }
}
