//! Chat relay: answers Slack DMs from canned rules or a hosted model.

pub mod channels;
pub mod config;
pub mod error;
pub mod keepalive;
pub mod llm;
pub mod pipeline;
