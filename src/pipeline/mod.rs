//! Intake and dispatch pipeline.
//!
//! Every event the platform adapter routes here flows through:
//! 1. `MessageProcessor::admit()` — automation and duplicate filters
//! 2. `RulesEngine::evaluate()` — diagnostics and canned topics (no LLM)
//! 3. `ReplyGenerator::generate()` — model reply with fixed fallbacks
//! 4. `ReplyDispatcher` — one post, or placeholder post + edit
//!
//! At most one reply is delivered per event.

pub mod dedup;
pub mod dispatcher;
pub mod generator;
pub mod processor;
pub mod rules;
pub mod types;

pub use dedup::DedupCache;
pub use dispatcher::{DeliveryStrategy, ReplyDispatcher};
pub use generator::ReplyGenerator;
pub use processor::MessageProcessor;
pub use rules::RulesEngine;
pub use types::{ChannelType, Decision, IgnoreReason, InboundEvent, OutboundReply};
