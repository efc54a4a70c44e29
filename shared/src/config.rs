use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use std::env;

pub const DEFAULT_TABLE_NAME: &str = "healthmate-body-measurements";
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Process-wide settings, read once per cold start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub table_name: String,
    pub log_level: String,
    pub max_attempts: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests don't touch process env
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let table_name = lookup("BODY_MEASUREMENTS_TABLE_NAME")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());
        let log_level = log_level(&lookup);

        let max_attempts = match lookup("DYNAMODB_MAX_ATTEMPTS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!(
                        "Invalid DYNAMODB_MAX_ATTEMPTS '{}', using {}",
                        raw,
                        DEFAULT_MAX_ATTEMPTS
                    );
                    DEFAULT_MAX_ATTEMPTS
                }
            },
            None => DEFAULT_MAX_ATTEMPTS,
        };

        Self {
            table_name,
            log_level,
            max_attempts,
        }
    }

    /// `LOG_LEVEL` as a tracing filter directive
    pub fn log_filter(&self) -> String {
        self.log_level.to_lowercase()
    }

    /// Filter directive from `LOG_LEVEL` alone. Lets the subscriber be
    /// installed before `from_env`, whose fallback warnings need it.
    pub fn log_filter_from_env() -> String {
        Self::log_filter_from_lookup(|key| env::var(key).ok())
    }

    pub fn log_filter_from_lookup<F>(lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        log_level(&lookup).to_lowercase()
    }

    /// Load AWS config with standard-mode retries (exponential backoff)
    pub async fn load_aws_config(&self) -> SdkConfig {
        aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::standard().with_max_attempts(self.max_attempts))
            .load()
            .await
    }
}

fn log_level<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("LOG_LEVEL")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
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
        let config = Config::from_lookup(lookup(&[]));

        assert_eq!(config.table_name, DEFAULT_TABLE_NAME);
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("BODY_MEASUREMENTS_TABLE_NAME", "measurements-dev"),
            ("LOG_LEVEL", "DEBUG"),
            ("DYNAMODB_MAX_ATTEMPTS", "5"),
        ]));

        assert_eq!(config.table_name, "measurements-dev");
        assert_eq!(config.log_filter(), "debug");
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn early_log_filter_agrees_with_full_config() {
        for pairs in [
            vec![],
            vec![("LOG_LEVEL", "WARN")],
            vec![("LOG_LEVEL", ""), ("DYNAMODB_MAX_ATTEMPTS", "lots")],
        ] {
            let early = Config::log_filter_from_lookup(lookup(&pairs));
            let full = Config::from_lookup(lookup(&pairs)).log_filter();
            assert_eq!(early, full);
        }
        assert_eq!(Config::log_filter_from_lookup(lookup(&[("LOG_LEVEL", "WARN")])), "warn");
    }

    #[test]
    fn bad_attempt_count_falls_back() {
        let config = Config::from_lookup(lookup(&[("DYNAMODB_MAX_ATTEMPTS", "lots")]));
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);

        let config = Config::from_lookup(lookup(&[("DYNAMODB_MAX_ATTEMPTS", "0")]));
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }
}
