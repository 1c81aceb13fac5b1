//! Pre-LLM rules for fast replies.
//!
//! Runs before the completion call to short-circuit fixed answers:
//! - diagnostic commands (`ping`, `version`) → exact, case-insensitive match
//! - canned topics (course links) → case-insensitive substring match
//!
//! If the rules engine returns a `Decision`, the LLM call is skipped entirely.

use tracing::debug;

use crate::config::Persona;
use crate::pipeline::types::Decision;

/// A literal command answered with a fixed reply.
#[derive(Debug, Clone)]
pub struct DiagnosticCommand {
    /// Lower-case command token.
    pub token: String,
    pub reply: String,
}

/// One row of the canned-topic table.
#[derive(Debug, Clone)]
pub struct CannedTopic {
    /// Lower-case phrases; any one of them triggers the row.
    pub triggers: Vec<String>,
    pub reply: String,
}

impl CannedTopic {
    fn matches(&self, lower: &str) -> bool {
        self.triggers.iter().any(|t| lower.contains(t.as_str()))
    }
}

/// Diagnostic commands plus an ordered canned-topic table.
pub struct RulesEngine {
    diagnostics: Vec<DiagnosticCommand>,
    topics: Vec<CannedTopic>,
}

impl RulesEngine {
    /// Create a rules engine with the stock commands and topics for a persona.
    pub fn default_rules(persona: Persona) -> Self {
        let diagnostics = vec![
            DiagnosticCommand {
                token: "ping".into(),
                reply: persona.diagnostic_token().into(),
            },
            DiagnosticCommand {
                token: "version".into(),
                reply: format!("{} v{}", persona.display_name(), env!("CARGO_PKG_VERSION")),
            },
        ];

        let topics = vec![
            CannedTopic {
                triggers: vec!["leg lock".into()],
                reply: "Leglocks for Dummies: https://leglocks.unclecoachkevin.com/".into(),
            },
            CannedTopic {
                triggers: vec![
                    "skool".into(),
                    "videos".into(),
                    "intro curriculum".into(),
                ],
                reply: "Skool (free intro + $15/mo full class videos): https://www.skool.com/gracie-trinity-academy".into(),
            },
        ];

        Self {
            diagnostics,
            topics,
        }
    }

    /// Create an empty rules engine (for testing).
    pub fn empty() -> Self {
        Self {
            diagnostics: Vec::new(),
            topics: Vec::new(),
        }
    }

    /// Add a diagnostic command. Checked after existing ones.
    pub fn add_diagnostic(&mut self, token: &str, reply: &str) {
        self.diagnostics.push(DiagnosticCommand {
            token: token.trim().to_lowercase(),
            reply: reply.into(),
        });
    }

    /// Append a canned topic to the bottom of the table.
    pub fn add_topic(&mut self, triggers: &[&str], reply: &str) {
        self.topics.push(CannedTopic {
            triggers: triggers.iter().map(|t| t.to_lowercase()).collect(),
            reply: reply.into(),
        });
    }

    /// Evaluate already-trimmed text against all rules.
    ///
    /// Returns `Some(Decision)` if a rule matches (short-circuits the LLM).
    /// Returns `None` if no rules match (fall through to the model).
    pub fn evaluate(&self, text: &str) -> Option<Decision> {
        let lower = text.to_lowercase();

        if let Some(cmd) = self.diagnostics.iter().find(|c| c.token == lower) {
            debug!(command = %cmd.token, "Matched diagnostic command");
            return Some(Decision::Diagnostic {
                reply: cmd.reply.clone(),
            });
        }

        // Top-to-bottom; ordering is the only overlap resolution.
        if let Some(topic) = self.topics.iter().find(|t| t.matches(&lower)) {
            debug!(triggers = ?topic.triggers, "Matched canned topic");
            return Some(Decision::Canned {
                reply: topic.reply.clone(),
            });
        }

        None
    }
}
