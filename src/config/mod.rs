//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! The database URL is wrapped in secrecy::SecretString to prevent log leaks.

pub mod vars;

pub use vars::{EnvVars, VarSource};

use crate::error::{Error, Result};
use crate::model::Language;
use crate::retry::RetryPolicy;
use secrecy::SecretString;

/// Named setting holding the default target language.
pub const TRANSCRIPTION_LANGUAGE: &str = "transcription-language";
/// Named setting holding the per-language quota of each response.
pub const TRANSCRIPTIONS_PER_RESPONSE: &str = "transcriptions-per-response";

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub settings: AllocatorSettings,
    pub retry: RetryPolicy,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let mut retry = RetryPolicy::default();
        if let Ok(raw) = std::env::var("TRANSCRIBEQ_MAX_ATTEMPTS") {
            retry.max_attempts = raw.trim().parse().map_err(|_| {
                Error::Config(format!("TRANSCRIBEQ_MAX_ATTEMPTS must be an integer, got '{raw}'"))
            })?;
        }

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            settings: AllocatorSettings::from_vars(&EnvVars)?,
            retry,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

/// Settings shared by the allocator and the recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatorSettings {
    /// Language used when a caller does not name one.
    pub default_language: Language,
    /// Maximum completed transcriptions per work item per language.
    pub quota_per_response: u32,
    /// Page size for eligible-set scans.
    pub page_size: usize,
}

impl AllocatorSettings {
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    pub fn new(default_language: Language, quota_per_response: u32) -> Self {
        Self {
            default_language,
            quota_per_response,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Read `transcription-language` and `transcriptions-per-response`.
    pub fn from_vars(vars: &dyn VarSource) -> Result<Self> {
        let language = vars
            .get_var(TRANSCRIPTION_LANGUAGE)
            .ok_or_else(|| Error::Config(format!("setting {TRANSCRIPTION_LANGUAGE} is not set")))?;
        let language = Language::new(language)
            .map_err(|_| Error::Config(format!("setting {TRANSCRIPTION_LANGUAGE} is empty")))?;

        let raw_quota = vars.get_var(TRANSCRIPTIONS_PER_RESPONSE).ok_or_else(|| {
            Error::Config(format!("setting {TRANSCRIPTIONS_PER_RESPONSE} is not set"))
        })?;
        let quota: u32 = raw_quota.trim().parse().map_err(|_| {
            Error::Config(format!(
                "setting {TRANSCRIPTIONS_PER_RESPONSE} must be a non-negative integer, got '{raw_quota}'"
            ))
        })?;
        if quota == 0 {
            return Err(Error::Config(format!(
                "setting {TRANSCRIPTIONS_PER_RESPONSE} must be at least 1"
            )));
        }

        Ok(Self::new(language, quota))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_named_settings() {
        let settings = AllocatorSettings::from_vars(&vars(&[
            (TRANSCRIPTION_LANGUAGE, "sw"),
            (TRANSCRIPTIONS_PER_RESPONSE, " 3 "),
        ]))
        .unwrap();
        assert_eq!(settings.default_language.as_str(), "sw");
        assert_eq!(settings.quota_per_response, 3);
        assert_eq!(settings.page_size, AllocatorSettings::DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn rejects_missing_or_bad_quota() {
        let missing = AllocatorSettings::from_vars(&vars(&[(TRANSCRIPTION_LANGUAGE, "en")]));
        assert!(matches!(missing, Err(Error::Config(_))));

        let bad = AllocatorSettings::from_vars(&vars(&[
            (TRANSCRIPTION_LANGUAGE, "en"),
            (TRANSCRIPTIONS_PER_RESPONSE, "two"),
        ]));
        assert!(matches!(bad, Err(Error::Config(_))));

        let zero = AllocatorSettings::from_vars(&vars(&[
            (TRANSCRIPTION_LANGUAGE, "en"),
            (TRANSCRIPTIONS_PER_RESPONSE, "0"),
        ]));
        assert!(matches!(zero, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_blank_language() {
        let blank = AllocatorSettings::from_vars(&vars(&[
            (TRANSCRIPTION_LANGUAGE, "  "),
            (TRANSCRIPTIONS_PER_RESPONSE, "2"),
        ]));
        assert!(matches!(blank, Err(Error::Config(_))));
    }
}
