//! Application configuration, read with figment from an optional
//! `pokecache.toml` and then the environment, which takes precedence.
//!
//! Durations accept human strings (`5s`, `1500ms`, `2m`) or bare seconds.

use crate::cache::CacheConfig;
use crate::pokeapi::DEFAULT_BASE_URL;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use fundu::DurationParser;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

pub const CONFIG_FILE: &str = "pokecache.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Level for this crate's targets when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Sliding TTL for cached resources.
    #[serde(default = "default_cache_ttl", deserialize_with = "deserialize_duration")]
    pub cache_ttl: Duration,
    #[serde(
        default = "default_sweep_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub sweep_interval: Duration,
    /// How long a lookup waits before showing its loading fallback.
    #[serde(
        default = "default_suspense_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub suspense_timeout: Duration,
    /// Artificial latency added to every fetch.
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub fetch_delay: Option<Duration>,
    #[serde(default = "default_pokeapi_url")]
    pub pokeapi_url: String,
}

impl Config {
    /// Extract from the config file and all environment variables. Unrelated
    /// variables are ignored.
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::raw()),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(self.cache_ttl).with_sweep_interval(self.sweep_interval)
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(5)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_suspense_timeout() -> Duration {
    crate::suspense::DEFAULT_TIMEOUT
}

fn default_pokeapi_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

/// Env values that look numeric arrive as numbers, everything else as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

fn parse_duration(raw: RawDuration) -> Result<Duration, String> {
    match raw {
        RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(text) => {
            let parsed = DurationParser::with_all_time_units()
                .parse(text.trim())
                .map_err(|e| format!("invalid duration {text:?}: {e}"))?;
            Duration::try_from(parsed).map_err(|e| format!("invalid duration {text:?}: {e}"))
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawDuration::deserialize(deserializer)?;
    parse_duration(raw).map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawDuration>::deserialize(deserializer)?
        .map(parse_duration)
        .transpose()
        .map_err(serde::de::Error::custom)
}
