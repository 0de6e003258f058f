//! Command-line / environment configuration.
//!
//! Every option can come from a flag or an environment variable (a `.env`
//! file is loaded first by `main`).  Only the feed list and the API key are
//! required.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::summarize::SummarizerSettings;
use crate::throttle::{RetryPolicy, SchedulerLimits, DEFAULT_TOKENS_PER_MINUTE};

/// Upper bound on generated summary length.
const SUMMARY_MAX_OUTPUT_TOKENS: u32 = 200;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no feeds configured (pass URLs or set FEED_URLS)")]
    NoFeeds,

    #[error("API key is empty (set OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("retry backoff factor must be a finite number >= 1, got {0}")]
    BadBackoff(f64),
}

/// Refresh feeds and attach generated summaries to new entries.
#[derive(Debug, Clone, Parser)]
#[command(name = "feedsum", version, about)]
pub struct Config {
    /// Feed URLs to refresh, in processing order.
    #[arg(env = "FEED_URLS", value_delimiter = ',', required = true)]
    pub feeds: Vec<String>,

    /// Directory holding one JSON snapshot per feed.
    #[arg(long, env = "FEEDSUM_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Maximum entries kept per feed.
    #[arg(long, env = "MAX_ITEMS_PER_FEED", default_value_t = 50)]
    pub max_items: usize,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "OPENAI_API_BASE", default_value = "https://api.openai.com/v1")]
    pub api_base: String,

    #[arg(long, env = "SUMMARY_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// Summary requests allowed in flight at once.
    #[arg(long, env = "MAX_CONCURRENT_REQUESTS", default_value_t = 3)]
    pub max_concurrent: usize,

    #[arg(long, env = "REQUESTS_PER_MINUTE", default_value_t = 15)]
    pub requests_per_minute: usize,

    /// Estimated token ceiling per minute.
    #[arg(long, env = "TOKENS_PER_MINUTE", default_value_t = DEFAULT_TOKENS_PER_MINUTE)]
    pub tokens_per_minute: u64,

    /// Attempts per summary, first try included.
    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value_t = 1000)]
    pub retry_base_ms: u64,

    #[arg(long, env = "RETRY_BACKOFF_FACTOR", default_value_t = 2.0)]
    pub retry_backoff: f64,
}

impl Config {
    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds().is_empty() {
            return Err(ConfigError::NoFeeds);
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        for (name, value) in [
            ("max-items", self.max_items as u64),
            ("max-concurrent", self.max_concurrent as u64),
            ("requests-per-minute", self.requests_per_minute as u64),
            ("tokens-per-minute", self.tokens_per_minute),
            ("max-attempts", u64::from(self.max_attempts)),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        if !self.retry_backoff.is_finite() || self.retry_backoff < 1.0 {
            return Err(ConfigError::BadBackoff(self.retry_backoff));
        }
        Ok(())
    }

    /// Trimmed, non-empty feed URLs.
    pub fn feeds(&self) -> Vec<String> {
        self.feeds
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn scheduler_limits(&self) -> SchedulerLimits {
        SchedulerLimits {
            max_in_flight: self.max_concurrent,
            max_per_interval: self.requests_per_minute,
            interval: Duration::from_secs(60),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_ms),
            self.retry_backoff,
        )
    }

    pub fn summarizer_settings(&self) -> SummarizerSettings {
        SummarizerSettings {
            api_base: self.api_base.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            max_output_tokens: SUMMARY_MAX_OUTPUT_TOKENS,
        }
    }
}

/// Load `env_file` (or `./.env` when `None`) into the process environment,
/// then build the log filter from `RUST_LOG`, defaulting to `info`.
///
/// Must run before the subscriber is installed so a `RUST_LOG` kept in the
/// env file takes effect.  A missing env file is not an error.
pub fn load_environment(env_file: Option<&Path>) -> EnvFilter {
    let _ = match env_file {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["feedsum"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_documented_limits() {
        let config = parse(&["--api-key", "sk-test", "https://example.com/feed"]);

        assert_eq!(config.feeds(), ["https://example.com/feed"]);
        assert_eq!(config.validate(), Ok(()));

        let limits = config.scheduler_limits();
        assert_eq!(limits.interval, Duration::from_secs(60));

        let retry = config.retry_policy();
        assert_eq!(retry.backoff_factor, config.retry_backoff);
        assert_eq!(retry.max_attempts, config.max_attempts);
    }

    #[test]
    fn comma_separated_feeds_are_split_and_trimmed() {
        let config = parse(&["--api-key", "k", "https://a.example/rss, https://b.example/rss,"]);
        assert_eq!(config.feeds(), ["https://a.example/rss", "https://b.example/rss"]);
    }

    #[test]
    fn validate_rejects_blank_key() {
        let config = parse(&["--api-key", "  ", "https://a.example/rss"]);
        assert_eq!(config.validate(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let config = parse(&[
            "--api-key",
            "k",
            "--max-concurrent",
            "0",
            "https://a.example/rss",
        ]);
        assert_eq!(config.validate(), Err(ConfigError::Zero("max-concurrent")));
    }

    #[test]
    fn validate_rejects_shrinking_backoff() {
        let config = parse(&[
            "--api-key",
            "k",
            "--retry-backoff",
            "0.5",
            "https://a.example/rss",
        ]);
        assert_eq!(config.validate(), Err(ConfigError::BadBackoff(0.5)));
    }

    #[test]
    fn summarizer_settings_carry_model_and_base() {
        let config = parse(&[
            "--api-key",
            "k",
            "--model",
            "tiny",
            "--api-base",
            "http://localhost:8080/v1",
            "https://a.example/rss",
        ]);
        let settings = config.summarizer_settings();
        assert_eq!(settings.model, "tiny");
        assert_eq!(settings.api_base, "http://localhost:8080/v1");
        assert_eq!(settings.max_output_tokens, SUMMARY_MAX_OUTPUT_TOKENS);
    }

    #[test]
    fn env_file_is_loaded_before_log_filter_is_built() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(&env_file, "RUST_LOG=feedsum=trace\n").unwrap();
        std::env::remove_var("RUST_LOG");

        let filter = load_environment(Some(&env_file));

        assert_eq!(filter.to_string(), "feedsum=trace");
        std::env::remove_var("RUST_LOG");
    }
}
