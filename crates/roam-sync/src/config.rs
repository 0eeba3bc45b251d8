use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::cache::DEFAULT_CACHE_TTL;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_CACHE_PATH: &str = "roam-cache.db";
pub const DEFAULT_TRANSITION_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub cache_path: PathBuf,
    pub cache_ttl: Duration,
    /// Pause between clearing a rejected record and re-requesting, so the
    /// intermediate state is visible.
    pub transition_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            cache_ttl: DEFAULT_CACHE_TTL,
            transition_delay: DEFAULT_TRANSITION_DELAY,
        }
    }
}

impl SyncConfig {
    /// Reads `ROAM_*` variables. Call `dotenvy::dotenv()` first if `.env`
    /// files should apply.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let cache_ttl = parse_or(&lookup, "ROAM_CACHE_TTL_SECS", defaults.cache_ttl.as_secs());
        let delay_ms = parse_or(
            &lookup,
            "ROAM_TRANSITION_DELAY_MS",
            defaults.transition_delay.as_millis() as u64,
        );

        Self {
            api_base_url: lookup("ROAM_API_BASE_URL").unwrap_or(defaults.api_base_url),
            cache_path: lookup("ROAM_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_path),
            cache_ttl: Duration::from_secs(cache_ttl),
            transition_delay: Duration::from_millis(delay_ms),
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
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
    fn defaults_when_unset() {
        assert_eq!(SyncConfig::from_lookup(lookup(&[])), SyncConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("ROAM_API_BASE_URL", "https://api.example.test"),
            ("ROAM_CACHE_TTL_SECS", "60"),
            ("ROAM_TRANSITION_DELAY_MS", "0"),
        ]));
        assert_eq!(config.api_base_url, "https://api.example.test");
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.transition_delay, Duration::ZERO);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = SyncConfig::from_lookup(lookup(&[("ROAM_CACHE_TTL_SECS", "soon")]));
        assert_eq!(config.cache_ttl, DEFAULT_CACHE_TTL);
    }
}
