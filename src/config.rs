// config.rs - Bot Configuration
// Loads KEY=VALUE pairs from botconfig.txt (searched in several locations),
// exports them to the process environment and builds a typed BotConfig.
//
// Used by: main.rs (startup)

use std::collections::HashMap;
use std::env;
use std::fs;
use std::ops::Range;

use log::{info, warn};
use serenity::model::id::ChannelId;
use thiserror::Error;

const CONFIG_PATHS: [&str; 4] = [
    "botconfig.txt",
    "../botconfig.txt",
    "../../botconfig.txt",
    "src/botconfig.txt",
];

const TOKEN_PLACEHOLDER: &str = "YOUR_BOT_TOKEN_HERE";

pub const DEFAULT_MEMBERS_API_ENDPOINT: &str = "https://saitamau-maximum.github.io/members";
pub const DEFAULT_TEX_RENDER_ENDPOINT: &str = "https://latex.codecogs.com/png.image";
pub const DEFAULT_ALUMNUS_ROLE: &str = "卒業生";
const DEFAULT_QUIET_HOURS: Range<u32> = 0..8;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Keys read from the config file or the environment.
const KNOWN_KEYS: [&str; 8] = [
    "DISCORD_TOKEN",
    "NOTIFY_CHANNEL_ID",
    "MEMBERS_API_ENDPOINT",
    "TEX_RENDER_ENDPOINT",
    "ALUMNUS_ROLE",
    "QUIET_HOURS",
    "HTTP_TIMEOUT",
    "RUST_LOG",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not found in botconfig.txt or the environment")]
    Missing(&'static str),

    #[error("DISCORD_TOKEN is set to a placeholder value")]
    PlaceholderToken,

    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub notify_channel_id: ChannelId,
    pub members_api_endpoint: String,
    pub tex_render_endpoint: String,
    pub alumnus_role: String,
    /// Local hours `[start, end)` during which voice notifications are muted.
    pub quiet_hours: Range<u32>,
    pub http_timeout_secs: u64,
}

impl BotConfig {
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let discord_token = get("DISCORD_TOKEN")
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?
            .to_string();
        if discord_token == TOKEN_PLACEHOLDER {
            return Err(ConfigError::PlaceholderToken);
        }

        let notify_raw = get("NOTIFY_CHANNEL_ID").ok_or(ConfigError::Missing("NOTIFY_CHANNEL_ID"))?;
        let notify_channel_id = notify_raw
            .parse::<u64>()
            .map(ChannelId)
            .map_err(|_| ConfigError::Invalid {
                key: "NOTIFY_CHANNEL_ID",
                value: notify_raw.to_string(),
                reason: "must be a numeric channel id",
            })?;

        let quiet_hours = match get("QUIET_HOURS") {
            Some(raw) => parse_quiet_hours(raw)?,
            None => DEFAULT_QUIET_HOURS,
        };

        let http_timeout_secs = match get("HTTP_TIMEOUT") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "HTTP_TIMEOUT",
                value: raw.to_string(),
                reason: "must be a whole number of seconds",
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(BotConfig {
            discord_token,
            notify_channel_id,
            members_api_endpoint: get("MEMBERS_API_ENDPOINT")
                .unwrap_or(DEFAULT_MEMBERS_API_ENDPOINT)
                .to_string(),
            tex_render_endpoint: get("TEX_RENDER_ENDPOINT")
                .unwrap_or(DEFAULT_TEX_RENDER_ENDPOINT)
                .to_string(),
            alumnus_role: get("ALUMNUS_ROLE").unwrap_or(DEFAULT_ALUMNUS_ROLE).to_string(),
            quiet_hours,
            http_timeout_secs,
        })
    }
}

/// Parse `FROM-TO` (24h clock). `FROM == TO` disables quiet hours.
fn parse_quiet_hours(raw: &str) -> Result<Range<u32>, ConfigError> {
    let invalid = |reason| ConfigError::Invalid {
        key: "QUIET_HOURS",
        value: raw.to_string(),
        reason,
    };

    let (from, to) = raw.split_once('-').ok_or_else(|| invalid("expected FROM-TO"))?;
    let from = from.trim().parse::<u32>().map_err(|_| invalid("FROM is not a number"))?;
    let to = to.trim().parse::<u32>().map_err(|_| invalid("TO is not a number"))?;
    if from > 24 || to > 24 || from > to {
        return Err(invalid("hours must satisfy 0 <= FROM <= TO <= 24"));
    }
    Ok(from..to)
}

/// Parse the contents of a botconfig.txt file.
pub fn parse_config_content(content: &str) -> HashMap<String, String> {
    // Remove BOM if present
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut config = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            config.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    config
}

/// Read botconfig.txt from the first location that has one and export its
/// values to the environment. Falls back to the process environment alone.
pub fn load_bot_config() -> Result<BotConfig, ConfigError> {
    let mut config = HashMap::new();

    for key in KNOWN_KEYS {
        if let Ok(value) = env::var(key) {
            config.insert(key.to_string(), value);
        }
    }

    match CONFIG_PATHS
        .iter()
        .find_map(|path| fs::read_to_string(path).ok().map(|content| (path, content)))
    {
        Some((path, content)) => {
            for (key, value) in parse_config_content(&content) {
                env::set_var(&key, &value);
                config.insert(key, value);
            }
            info!("Configuration loaded from {}", path);
        }
        None => {
            warn!("No botconfig.txt found (., .., ../.., src/), using environment variables only");
        }
    }

    BotConfig::from_map(&config)
}
