//! Configuration types.
//!
//! Everything is read once at startup. `Config::from_env` is the production
//! entry point; `Config::from_lookup` takes any key lookup so tests never have
//! to touch the process environment.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// Default completion model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Persona the bot speaks as. Selects the system prompt and diagnostic token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    Brand,
    Gracie,
}

impl Persona {
    /// Parse the `BOT_NAME` value. `alt` is accepted as an alias for the academy persona.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "brand" => Some(Self::Brand),
            "gracie" | "alt" => Some(Self::Gracie),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Brand => "Brand GPT",
            Self::Gracie => "Gracie Trinity GPT",
        }
    }

    /// Literal reply to the `ping` diagnostic.
    pub fn diagnostic_token(&self) -> &'static str {
        match self {
            Self::Brand => "BRAND-OK-123",
            Self::Gracie => "GRACIE-OK-123",
        }
    }

    /// System turn sent ahead of every user message.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}, Kevin’s assistant for Gracie Trinity Academy.\n\
             Tone: friendly, concise, no fluff.\n\
             When relevant, include short CTAs with these links:\n\
             - Leg lock course: https://leglocks.unclecoachkevin.com/\n\
             - Skool community & class videos: https://www.skool.com/gracie-trinity-academy\n\
             Answer clearly and offer next steps if asking about schedule, pricing, or how to join.",
            self.display_name()
        )
    }
}

/// De-duplication window.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Maximum number of remembered event ids.
    pub capacity: usize,
    /// How long an event id is remembered.
    pub ttl: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            ttl: Duration::from_secs(600), // 10 minutes
        }
    }
}

/// Intake and dispatch policy settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub persona: Persona,
    pub dedup_enabled: bool,
    pub placeholder_enabled: bool,
    pub dedup: DedupConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            persona: Persona::Brand,
            dedup_enabled: true,
            placeholder_enabled: false,
            dedup: DedupConfig::default(),
        }
    }
}

/// Slack credentials.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// Web API token (`xoxb-…`).
    pub bot_token: SecretString,
    /// Socket Mode token (`xapp-…`).
    pub app_token: SecretString,
    pub signing_secret: SecretString,
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    pub llm: LlmConfig,
    pub relay: RelayConfig,
    /// Keepalive HTTP port. The endpoint is only served when set.
    pub keepalive_port: Option<u16>,
}

impl Config {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<SecretString, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let slack = SlackConfig {
            bot_token: required("SLACK_BOT_TOKEN")?,
            app_token: required("SLACK_APP_TOKEN")?,
            signing_secret: required("SLACK_SIGNING_SECRET")?,
        };

        let llm = LlmConfig {
            api_key: required("OPENAI_API_KEY")?,
            model: lookup("RELAY_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };

        let persona = match lookup("BOT_NAME") {
            Some(name) => Persona::parse(&name).ok_or_else(|| ConfigError::InvalidValue {
                key: "BOT_NAME".into(),
                message: format!("expected 'brand' or 'gracie', got '{name}'"),
            })?,
            None => Persona::Brand,
        };

        let defaults = RelayConfig::default();
        let relay = RelayConfig {
            persona,
            dedup_enabled: parse_flag(&lookup, "RELAY_DEDUP", defaults.dedup_enabled)?,
            placeholder_enabled: parse_flag(
                &lookup,
                "RELAY_PLACEHOLDER",
                defaults.placeholder_enabled,
            )?,
            dedup: DedupConfig {
                capacity: parse_number(&lookup, "RELAY_DEDUP_CAPACITY", defaults.dedup.capacity)?,
                ttl: Duration::from_secs(parse_number(
                    &lookup,
                    "RELAY_DEDUP_TTL_SECS",
                    defaults.dedup.ttl.as_secs(),
                )?),
            },
        };

        let keepalive_port = match lookup("PORT").filter(|p| !p.trim().is_empty()) {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                ConfigError::InvalidValue {
                    key: "PORT".into(),
                    message: e.to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            slack,
            llm,
            relay,
            keepalive_port,
        })
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SLACK_BOT_TOKEN", "xoxb-test"),
            ("SLACK_APP_TOKEN", "xapp-test"),
            ("SLACK_SIGNING_SECRET", "shh"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_when_only_credentials_set() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.slack.bot_token.expose_secret(), "xoxb-test");
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.relay.persona, Persona::Brand);
        assert!(config.relay.dedup_enabled);
        assert!(!config.relay.placeholder_enabled);
        assert_eq!(config.relay.dedup.capacity, 4096);
        assert_eq!(config.keepalive_port, None);
    }

    #[test]
    fn missing_slack_token_is_fatal() {
        let mut env = base_env();
        env.remove("SLACK_APP_TOKEN");
        match load(&env) {
            Err(ConfigError::MissingEnvVar(key)) => assert_eq!(key, "SLACK_APP_TOKEN"),
            other => panic!("Expected MissingEnvVar, got {:?}", other),
        }
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut env = base_env();
        env.insert("OPENAI_API_KEY", "   ");
        assert!(matches!(load(&env), Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn persona_and_flags_parsed() {
        let mut env = base_env();
        env.insert("BOT_NAME", "Gracie");
        env.insert("RELAY_DEDUP", "off");
        env.insert("RELAY_PLACEHOLDER", "yes");
        env.insert("RELAY_DEDUP_TTL_SECS", "30");
        env.insert("PORT", "3000");
        let config = load(&env).unwrap();
        assert_eq!(config.relay.persona, Persona::Gracie);
        assert!(!config.relay.dedup_enabled);
        assert!(config.relay.placeholder_enabled);
        assert_eq!(config.relay.dedup.ttl, Duration::from_secs(30));
        assert_eq!(config.keepalive_port, Some(3000));
    }

    #[test]
    fn unknown_persona_rejected() {
        let mut env = base_env();
        env.insert("BOT_NAME", "robot");
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "BOT_NAME"
        ));
    }

    #[test]
    fn bad_port_rejected() {
        let mut env = base_env();
        env.insert("PORT", "http");
        assert!(matches!(load(&env), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn persona_alias_and_prompt() {
        assert_eq!(Persona::parse("alt"), Some(Persona::Gracie));
        assert!(Persona::Brand.system_prompt().starts_with("You are Brand GPT"));
        assert!(
            Persona::Gracie
                .system_prompt()
                .contains("https://leglocks.unclecoachkevin.com/")
        );
    }
}
