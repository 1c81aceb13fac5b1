//! Messaging platform adapters.

pub mod platform;
pub mod slack;

pub use platform::MessagingPlatform;
pub use slack::{RoutedEvent, SlackChannel, route_payload};
