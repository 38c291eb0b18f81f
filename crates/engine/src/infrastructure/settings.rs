//! Bot settings loaded from the environment.
//!
//! Only `DISCORD_TOKEN` is required; every other key has the default the bot
//! has always run with.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use lucie_domain::DEFAULT_COOLDOWN;

use crate::use_cases::draw::DEFAULT_DEDUP_CAPACITY;

pub const DEFAULT_COMMAND_PREFIX: &str = "!";
pub const DEFAULT_COMMAND_NAME: &str = "lucie";
pub const DEFAULT_HEALTH_HOST: &str = "0.0.0.0";
pub const DEFAULT_HEALTH_PORTS: [u16; 6] = [8080, 8081, 8082, 8083, 8084, 8085];
pub const DEFAULT_LOCK_FILE: &str = ".bot.lock";
pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_DISCORD_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("DISCORD_TOKEN is not set")]
    MissingToken,
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct BotSettings {
    pub discord_token: String,
    pub command_prefix: String,
    pub command_name: String,
    pub cooldown: Duration,
    pub dedup_capacity: usize,
    pub health_host: String,
    pub health_ports: Vec<u16>,
    pub lock_file: PathBuf,
    pub discord_api_base: String,
    pub discord_gateway_url: String,
}

// Token stays out of logs
impl fmt::Debug for BotSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotSettings")
            .field("discord_token", &"<redacted>")
            .field("command_prefix", &self.command_prefix)
            .field("command_name", &self.command_name)
            .field("cooldown", &self.cooldown)
            .field("dedup_capacity", &self.dedup_capacity)
            .field("health_host", &self.health_host)
            .field("health_ports", &self.health_ports)
            .field("lock_file", &self.lock_file)
            .field("discord_api_base", &self.discord_api_base)
            .field("discord_gateway_url", &self.discord_gateway_url)
            .finish()
    }
}

impl BotSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let discord_token = get("DISCORD_TOKEN").ok_or(SettingsError::MissingToken)?;

        let cooldown = match get("COOLDOWN_SECS") {
            Some(value) => Duration::from_secs(parse_number("COOLDOWN_SECS", &value)?),
            None => DEFAULT_COOLDOWN,
        };

        let dedup_capacity = match get("DEDUP_CAPACITY") {
            Some(value) => parse_capacity(&value)?,
            None => DEFAULT_DEDUP_CAPACITY,
        };

        let health_ports = match get("HEALTH_PORTS") {
            Some(value) => parse_ports(&value)?,
            None => DEFAULT_HEALTH_PORTS.to_vec(),
        };

        Ok(Self {
            discord_token,
            command_prefix: get("COMMAND_PREFIX").unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.into()),
            command_name: get("COMMAND_NAME").unwrap_or_else(|| DEFAULT_COMMAND_NAME.into()),
            cooldown,
            dedup_capacity,
            health_host: get("HEALTH_HOST").unwrap_or_else(|| DEFAULT_HEALTH_HOST.into()),
            health_ports,
            lock_file: get("LOCK_FILE")
                .unwrap_or_else(|| DEFAULT_LOCK_FILE.into())
                .into(),
            discord_api_base: get("DISCORD_API_BASE")
                .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE.into()),
            discord_gateway_url: get("DISCORD_GATEWAY_URL")
                .unwrap_or_else(|| DEFAULT_DISCORD_GATEWAY_URL.into()),
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, SettingsError> {
    value.parse().map_err(|_| SettingsError::Invalid {
        key,
        value: value.to_string(),
    })
}

// Zero would clear the window on every insert and disable dedup
fn parse_capacity(value: &str) -> Result<usize, SettingsError> {
    match parse_number("DEDUP_CAPACITY", value)? {
        0 => Err(SettingsError::Invalid {
            key: "DEDUP_CAPACITY",
            value: value.to_string(),
        }),
        capacity => Ok(capacity),
    }
}

fn parse_ports(value: &str) -> Result<Vec<u16>, SettingsError> {
    let ports = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_number::<u16>("HEALTH_PORTS", s))
        .collect::<Result<Vec<_>, _>>()?;

    if ports.is_empty() {
        return Err(SettingsError::Invalid {
            key: "HEALTH_PORTS",
            value: value.to_string(),
        });
    }
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let settings = BotSettings::from_lookup(lookup(&[("DISCORD_TOKEN", "abc")])).unwrap();

        assert_eq!(settings.discord_token, "abc");
        assert_eq!(settings.command_prefix, "!");
        assert_eq!(settings.command_name, "lucie");
        assert_eq!(settings.cooldown, Duration::from_secs(3600));
        assert_eq!(settings.dedup_capacity, 1000);
        assert_eq!(settings.health_ports, vec![8080, 8081, 8082, 8083, 8084, 8085]);
        assert_eq!(settings.lock_file, PathBuf::from(".bot.lock"));
    }

    #[test]
    fn missing_or_blank_token_is_an_error() {
        assert_eq!(
            BotSettings::from_lookup(lookup(&[])).unwrap_err(),
            SettingsError::MissingToken
        );
        assert_eq!(
            BotSettings::from_lookup(lookup(&[("DISCORD_TOKEN", "  ")])).unwrap_err(),
            SettingsError::MissingToken
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = BotSettings::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("COOLDOWN_SECS", "90"),
            ("DEDUP_CAPACITY", "10"),
            ("HEALTH_PORTS", "9000, 9001"),
            ("COMMAND_PREFIX", "?"),
        ]))
        .unwrap();

        assert_eq!(settings.cooldown, Duration::from_secs(90));
        assert_eq!(settings.dedup_capacity, 10);
        assert_eq!(settings.health_ports, vec![9000, 9001]);
        assert_eq!(settings.command_prefix, "?");
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = BotSettings::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("COOLDOWN_SECS", "an hour"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            SettingsError::Invalid {
                key: "COOLDOWN_SECS",
                value: "an hour".into()
            }
        );

        let err = BotSettings::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("HEALTH_PORTS", "8080,99999"),
        ]))
        .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { key: "HEALTH_PORTS", .. }));
    }

    #[test]
    fn zero_dedup_capacity_is_rejected() {
        let err = BotSettings::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("DEDUP_CAPACITY", "0"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            SettingsError::Invalid {
                key: "DEDUP_CAPACITY",
                value: "0".into()
            }
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let settings =
            BotSettings::from_lookup(lookup(&[("DISCORD_TOKEN", "super-secret")])).unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
