//! Message processor — the intake classifier and its two handlers.
//!
//! Direct messages flow through:
//! 1. Automation filter (subtype, missing author, bot author) → drop
//! 2. Idempotency filter (dedup cache, when enabled) → drop duplicates
//! 3. Rules engine (diagnostics, canned topics) → fixed reply
//! 4. Completion call → model reply
//!
//! Mentions pass the same filters and always get one fixed nudge.
//! Scope (DM vs mention) is decided by the platform adapter before either
//! handler is called.

use std::sync::Arc;

use tracing::{debug, info};

use crate::channels::MessagingPlatform;
use crate::config::RelayConfig;
use crate::llm::LlmProvider;
use crate::pipeline::dedup::DedupCache;
use crate::pipeline::dispatcher::{DeliveryStrategy, ReplyDispatcher};
use crate::pipeline::generator::ReplyGenerator;
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{Decision, IgnoreReason, InboundEvent, OutboundReply};

/// Nudge posted in reply to a channel mention.
pub fn mention_nudge(user_id: &str) -> String {
    format!(
        "Hey <@{user_id}> — DM me for full help. Try “leg lock course” or ask anything about Gracie Trinity."
    )
}

/// Classifies inbound events and dispatches at most one reply per event.
pub struct MessageProcessor {
    rules: RulesEngine,
    dedup: Option<Arc<DedupCache>>,
    generator: ReplyGenerator,
    dispatcher: ReplyDispatcher,
}

impl MessageProcessor {
    /// Create a processor from explicit parts.
    pub fn new(
        rules: RulesEngine,
        dedup: Option<Arc<DedupCache>>,
        generator: ReplyGenerator,
        dispatcher: ReplyDispatcher,
    ) -> Self {
        Self {
            rules,
            dedup,
            generator,
            dispatcher,
        }
    }

    /// Wire the stock rules, dedup cache, generator and dispatcher from config.
    pub fn from_config(
        config: &RelayConfig,
        llm: Arc<dyn LlmProvider>,
        platform: Arc<dyn MessagingPlatform>,
    ) -> Self {
        let dedup = config
            .dedup_enabled
            .then(|| Arc::new(DedupCache::new(&config.dedup)));
        Self::new(
            RulesEngine::default_rules(config.persona),
            dedup,
            ReplyGenerator::new(llm, config.persona.system_prompt()),
            ReplyDispatcher::new(
                platform,
                DeliveryStrategy::from_placeholder_flag(config.placeholder_enabled),
            ),
        )
    }

    /// Automation and idempotency filters, in that order.
    ///
    /// An event without an id is admitted without de-duplication.
    pub fn admit(&self, event: &InboundEvent) -> Result<(), IgnoreReason> {
        if event.subtype.is_some() {
            return Err(IgnoreReason::Subtype);
        }
        if event.author_id.is_none() || event.is_from_automation {
            return Err(IgnoreReason::Automation);
        }
        if let (Some(cache), Some(event_id)) = (&self.dedup, event.event_id.as_deref()) {
            if !cache.check_and_insert(event_id) {
                return Err(IgnoreReason::Duplicate);
            }
        }
        Ok(())
    }

    /// Full classification of a direct message. Records the event id when admitted.
    pub fn classify(&self, event: &InboundEvent) -> Decision {
        if let Err(reason) = self.admit(event) {
            return Decision::Ignore(reason);
        }

        let text = event.text.trim();
        self.rules.evaluate(text).unwrap_or_else(|| Decision::Model {
            prompt: text.to_string(),
        })
    }

    /// Handle a direct message.
    pub async fn handle_message(&self, event: InboundEvent) -> Option<OutboundReply> {
        let decision = self.classify(&event);

        if let Decision::Ignore(reason) = decision {
            debug!(
                channel = %event.channel_id,
                event_id = event.event_id.as_deref().unwrap_or("none"),
                reason = reason.label(),
                "Ignoring event"
            );
            return None;
        }

        info!(
            channel = %event.channel_id,
            user = event.author_id.as_deref().unwrap_or("unknown"),
            event_id = event.event_id.as_deref().unwrap_or("none"),
            decision = decision.label(),
            "DM from user: {:?}",
            event.text.trim()
        );

        match decision {
            Decision::Diagnostic { reply } | Decision::Canned { reply } => {
                self.dispatcher.deliver(&event.channel_id, &reply).await
            }
            Decision::Model { prompt } => {
                self.dispatcher
                    .deliver_generated(&event.channel_id, self.generator.generate(&prompt))
                    .await
            }
            Decision::Ignore(_) => None,
        }
    }

    /// Handle an explicit mention. The reply ignores the mention's text.
    pub async fn handle_mention(&self, event: InboundEvent) -> Option<OutboundReply> {
        if let Err(reason) = self.admit(&event) {
            debug!(
                channel = %event.channel_id,
                reason = reason.label(),
                "Ignoring mention"
            );
            return None;
        }

        let user = event.author_id.as_deref().unwrap_or_default();
        info!(channel = %event.channel_id, user = %user, "Mentioned in channel");
        self.dispatcher
            .deliver(&event.channel_id, &mention_nudge(user))
            .await
    }
}
