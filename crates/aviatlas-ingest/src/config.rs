//! Ingest configuration
//!
//! Loaded from the environment (and a `.env` file when present). CLI flags
//! are applied on top with the `with_*` builders.

use aviatlas_common::{AviatlasError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::ebird_taxonomy::{FamilyConflictPolicy, RetryPolicy};

// ============================================================================
// Defaults
// ============================================================================

/// Default destination table.
pub const DEFAULT_TABLE: &str = "bird_taxonomy";

/// Default number of nodes per insert request.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default attempts per batch, first attempt included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay after the first failed attempt, in milliseconds.
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuration for one taxonomy import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Base URL of the REST table API (e.g. `https://xyz.supabase.co`)
    pub supabase_url: Option<String>,
    #[serde(skip_serializing)]
    pub service_role_key: Option<String>,
    pub table: String,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub http_timeout_secs: u64,
    pub family_conflict: FamilyConflictPolicy,
    /// Postgres connection string for the `database` backend
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    /// Build and report without writing to storage
    pub dry_run: bool,
    /// Where to write the text report, if anywhere
    pub report_dir: Option<PathBuf>,
    pub show_progress: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            service_role_key: None,
            table: DEFAULT_TABLE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            family_conflict: FamilyConflictPolicy::default(),
            database_url: None,
            dry_run: false,
            report_dir: None,
            show_progress: false,
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment and defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            supabase_url: non_empty("SUPABASE_URL").or_else(|| non_empty("NEXT_PUBLIC_SUPABASE_URL")),
            service_role_key: non_empty("SUPABASE_SERVICE_ROLE_KEY"),
            table: non_empty("AVIATLAS_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            batch_size: parse_or(&lookup, "AVIATLAS_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            max_attempts: parse_or(&lookup, "AVIATLAS_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            backoff_ms: parse_or(&lookup, "AVIATLAS_BACKOFF_MS", DEFAULT_BACKOFF_MS),
            http_timeout_secs: parse_or(&lookup, "AVIATLAS_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            family_conflict: match non_empty("AVIATLAS_FAMILY_CONFLICT") {
                Some(value) => value.parse().map_err(AviatlasError::Config)?,
                None => FamilyConflictPolicy::default(),
            },
            database_url: non_empty("DATABASE_URL"),
            ..Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn with_supabase(mut self, url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        self.supabase_url = Some(url.into());
        self.service_role_key = Some(service_role_key.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.backoff_ms = backoff_ms;
        self
    }

    pub fn with_family_conflict(mut self, policy: FamilyConflictPolicy) -> Self {
        self.family_conflict = policy;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// REST endpoint and key, or a configuration error naming what is missing
    pub fn rest_credentials(&self) -> Result<(&str, &str)> {
        let url = self.supabase_url.as_deref().ok_or_else(|| {
            AviatlasError::Config("SUPABASE_URL (or NEXT_PUBLIC_SUPABASE_URL) not set".to_string())
        })?;
        let key = self
            .service_role_key
            .as_deref()
            .ok_or_else(|| AviatlasError::Config("SUPABASE_SERVICE_ROLE_KEY not set".to_string()))?;
        Ok((url, key))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AviatlasError::Config("Batch size must be greater than 0".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(AviatlasError::Config("Max attempts must be greater than 0".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(AviatlasError::Config("HTTP timeout must be greater than 0".to_string()));
        }
        if !is_identifier(&self.table) {
            return Err(AviatlasError::Config(format!("Invalid table name: '{}'", self.table)));
        }
        if let Some(url) = &self.supabase_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AviatlasError::Config(format!("Invalid SUPABASE_URL: '{}'", url)));
            }
        }
        Ok(())
    }
}

/// Plain SQL identifier: letters, digits and underscores, not starting with a digit
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparseable setting, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.table, DEFAULT_TABLE);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.family_conflict, FamilyConflictPolicy::Warn);
        assert!(config.supabase_url.is_none());
        assert!(!config.dry_run);
    }

    #[test]
    fn test_environment_overrides() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "secret"),
            ("AVIATLAS_TABLE", "bird_taxonomy_staging"),
            ("AVIATLAS_BATCH_SIZE", "100"),
            ("AVIATLAS_FAMILY_CONFLICT", "reject"),
        ]))
        .unwrap();

        assert_eq!(config.supabase_url.as_deref(), Some("https://example.supabase.co"));
        assert_eq!(config.table, "bird_taxonomy_staging");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.family_conflict, FamilyConflictPolicy::Reject);
        assert_eq!(config.rest_credentials().unwrap(), ("https://example.supabase.co", "secret"));
    }

    #[test]
    fn test_public_url_fallback() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", ""),
            ("NEXT_PUBLIC_SUPABASE_URL", "https://public.supabase.co"),
        ]))
        .unwrap();
        assert_eq!(config.supabase_url.as_deref(), Some("https://public.supabase.co"));
    }

    #[test]
    fn test_unparseable_number_falls_back() {
        let config = IngestConfig::from_lookup(lookup(&[("AVIATLAS_BATCH_SIZE", "lots")])).unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = IngestConfig::from_lookup(lookup(&[("AVIATLAS_BATCH_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, AviatlasError::Config(_)));

        assert!(IngestConfig::new().with_batch_size(0).validate().is_err());
    }

    #[test]
    fn test_invalid_conflict_policy_rejected() {
        let err = IngestConfig::from_lookup(lookup(&[("AVIATLAS_FAMILY_CONFLICT", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }

    #[test]
    fn test_table_name_must_be_identifier() {
        assert!(IngestConfig::new().with_table("bird_taxonomy; drop").validate().is_err());
        assert!(IngestConfig::new().with_table("1birds").validate().is_err());
        assert!(IngestConfig::new().with_table("_birds2").validate().is_ok());
    }

    #[test]
    fn test_missing_credentials() {
        let err = IngestConfig::new().rest_credentials().unwrap_err();
        assert!(err.to_string().contains("SUPABASE_URL"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = IngestConfig::new().with_max_attempts(5).with_backoff_ms(10).retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(10));
    }
}
