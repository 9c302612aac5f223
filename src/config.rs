//! Runtime settings
//!
//! Settings come from defaults, an optional YAML file and then the process
//! environment, in that order. Credentials are normally only given through
//! the environment.
//!
//! ```yaml
//! freshdesk:
//!   domain: acme
//!   page_size: 100
//!   rate_limit_rps: 4
//! bigquery:
//!   schema_file: schema.json
//! loader:
//!   replace_pause_seconds: 15
//! server:
//!   port: 8080
//! ```

use crate::auth::{AuthConfig, ServiceAccountKey};
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::loader::{LoaderConfig, RetryPolicy};
use crate::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::store::BIGQUERY_ENDPOINT;
use crate::types::{BackoffType, OptionStringExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-Level Settings
// ============================================================================

/// All runtime settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Freshdesk source
    #[serde(default)]
    pub freshdesk: FreshdeskSettings,

    /// BigQuery destination
    #[serde(default)]
    pub bigquery: BigQuerySettings,

    /// HTTP client behavior
    #[serde(default)]
    pub http: HttpSettings,

    /// Loader tunables
    #[serde(default)]
    pub loader: LoaderSettings,

    /// Trigger server
    #[serde(default)]
    pub server: ServerSettings,
}

// ============================================================================
// Freshdesk
// ============================================================================

/// Freshdesk source settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshdeskSettings {
    /// API key, sent as Basic auth username
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Company subdomain, host name or full base URL
    #[serde(default)]
    pub domain: Option<String>,

    /// Records per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Client-side request rate limit
    #[serde(default)]
    pub rate_limit_rps: Option<u32>,
}

impl Default for FreshdeskSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            domain: None,
            page_size: default_page_size(),
            rate_limit_rps: None,
        }
    }
}

impl std::fmt::Debug for FreshdeskSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshdeskSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("domain", &self.domain)
            .field("page_size", &self.page_size)
            .field("rate_limit_rps", &self.rate_limit_rps)
            .finish()
    }
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

// ============================================================================
// BigQuery
// ============================================================================

/// BigQuery destination settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BigQuerySettings {
    /// API root
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Static OAuth access token
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    /// Service account key file
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,

    /// Schema registry file
    #[serde(default = "default_schema_file")]
    pub schema_file: PathBuf,
}

impl Default for BigQuerySettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_token: None,
            credentials_file: None,
            schema_file: default_schema_file(),
        }
    }
}

impl std::fmt::Debug for BigQuerySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQuerySettings")
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("credentials_file", &self.credentials_file)
            .field("schema_file", &self.schema_file)
            .finish()
    }
}

fn default_endpoint() -> String {
    BIGQUERY_ENDPOINT.to_string()
}

fn default_schema_file() -> PathBuf {
    PathBuf::from("schema.json")
}

// ============================================================================
// HTTP
// ============================================================================

/// HTTP client settings shared by both APIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Transport-level retries of 429/5xx/timeouts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff
    #[serde(default)]
    pub retry_backoff: BackoffSettings,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: BackoffSettings::default(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Backoff settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffSettings {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    500
}

fn default_max_ms() -> u64 {
    30_000
}

// ============================================================================
// Loader
// ============================================================================

/// Loader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderSettings {
    /// Insert attempts after creating a table
    #[serde(default = "default_insert_attempts")]
    pub insert_max_attempts: u32,

    /// First insert retry delay in milliseconds
    #[serde(default = "default_insert_initial_ms")]
    pub insert_initial_delay_ms: u64,

    /// Insert retry delay cap in milliseconds
    #[serde(default = "default_insert_max_ms")]
    pub insert_max_delay_ms: u64,

    /// Overall insert retry budget in seconds
    #[serde(default = "default_ten_minutes")]
    pub insert_deadline_seconds: u64,

    /// Pause after dropping a table in seconds
    #[serde(default = "default_replace_pause")]
    pub replace_pause_seconds: u64,

    /// Load job poll interval in milliseconds
    #[serde(default = "default_poll_ms")]
    pub job_poll_interval_ms: u64,

    /// Longest wait for a load job in seconds
    #[serde(default = "default_ten_minutes")]
    pub job_timeout_seconds: u64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            insert_max_attempts: default_insert_attempts(),
            insert_initial_delay_ms: default_insert_initial_ms(),
            insert_max_delay_ms: default_insert_max_ms(),
            insert_deadline_seconds: default_ten_minutes(),
            replace_pause_seconds: default_replace_pause(),
            job_poll_interval_ms: default_poll_ms(),
            job_timeout_seconds: default_ten_minutes(),
        }
    }
}

fn default_insert_attempts() -> u32 {
    100
}

fn default_insert_initial_ms() -> u64 {
    1000
}

fn default_insert_max_ms() -> u64 {
    5000
}

fn default_ten_minutes() -> u64 {
    600
}

fn default_replace_pause() -> u64 {
    15
}

fn default_poll_ms() -> u64 {
    2000
}

// ============================================================================
// Server
// ============================================================================

/// Trigger server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

// ============================================================================
// Loading
// ============================================================================

impl Settings {
    /// Parse settings from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|_| Error::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_yaml(&contents)
    }

    /// Defaults or file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Override settings from environment variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).none_if_empty();

        if let Some(key) = var("FRESHDESK_API_KEY").or_else(|| var("api_key")) {
            self.freshdesk.api_key = Some(key);
        }
        if let Some(domain) = var("FRESHDESK_DOMAIN").or_else(|| var("FRESHDESK_COMPANY")) {
            self.freshdesk.domain = Some(domain);
        }
        if let Some(endpoint) = var("BIGQUERY_ENDPOINT") {
            self.bigquery.endpoint = endpoint;
        }
        if let Some(token) = var("BIGQUERY_ACCESS_TOKEN") {
            self.bigquery.access_token = Some(token);
        }
        if let Some(path) = var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.bigquery.credentials_file = Some(PathBuf::from(path));
        }
        if let Some(path) = var("SCHEMA_FILE") {
            self.bigquery.schema_file = PathBuf::from(path);
        }
        if let Some(port) = var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::invalid_value("PORT", format!("'{port}' is not a port")))?;
        }

        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let size = self.freshdesk.page_size;
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(Error::invalid_value(
                "freshdesk.page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}, got {size}"),
            ));
        }
        if self.freshdesk.rate_limit_rps == Some(0) {
            return Err(Error::invalid_value(
                "freshdesk.rate_limit_rps",
                "must be positive",
            ));
        }
        if self.loader.insert_max_attempts == 0 {
            return Err(Error::invalid_value(
                "loader.insert_max_attempts",
                "must be at least 1",
            ));
        }
        url::Url::parse(&self.bigquery.endpoint)?;
        Ok(())
    }

    // ========================================================================
    // Derived configuration
    // ========================================================================

    /// Freshdesk API root, e.g. `https://acme.freshdesk.com`
    pub fn freshdesk_base_url(&self) -> Result<String> {
        let domain = self
            .freshdesk
            .domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::missing_field("FRESHDESK_DOMAIN"))?;

        let base = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.trim_end_matches('/').to_string()
        } else if domain.contains('.') {
            format!("https://{domain}")
        } else {
            format!("https://{domain}.freshdesk.com")
        };

        url::Url::parse(&base)?;
        Ok(base)
    }

    /// Basic auth from the API key
    pub fn freshdesk_auth(&self) -> Result<AuthConfig> {
        self.freshdesk
            .api_key
            .clone()
            .none_if_empty()
            .map(AuthConfig::freshdesk_api_key)
            .ok_or_else(|| Error::missing_field("FRESHDESK_API_KEY"))
    }

    /// Access token, then service account key, then metadata server
    pub fn bigquery_auth(&self) -> Result<AuthConfig> {
        if let Some(token) = self.bigquery.access_token.clone().none_if_empty() {
            return Ok(AuthConfig::Bearer { token });
        }
        if let Some(path) = &self.bigquery.credentials_file {
            let key = ServiceAccountKey::from_file(path)?;
            return Ok(AuthConfig::service_account(key));
        }
        Ok(AuthConfig::metadata_server())
    }

    /// HTTP client config for an API root
    pub fn http_client_config(&self, base_url: impl Into<String>) -> HttpClientConfig {
        let backoff = &self.http.retry_backoff;
        HttpClientConfig::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(self.http.timeout_seconds))
            .max_retries(self.http.max_retries)
            .backoff(
                backoff.backoff_type,
                Duration::from_millis(backoff.initial_ms),
                Duration::from_millis(backoff.max_ms),
            )
            .build()
    }

    /// HTTP client config for Freshdesk, with the rate limit applied
    pub fn freshdesk_client_config(&self) -> Result<HttpClientConfig> {
        let mut config = self.http_client_config(self.freshdesk_base_url()?);
        config.rate_limit = self
            .freshdesk
            .rate_limit_rps
            .map(|rps| RateLimiterConfig::new(rps, rps));
        Ok(config)
    }

    /// Loader tunables
    pub fn loader_config(&self) -> LoaderConfig {
        let l = &self.loader;
        LoaderConfig {
            retry: RetryPolicy {
                max_attempts: l.insert_max_attempts,
                initial_delay: Duration::from_millis(l.insert_initial_delay_ms),
                max_delay: Duration::from_millis(l.insert_max_delay_ms),
                backoff: BackoffType::Exponential,
                deadline: Some(Duration::from_secs(l.insert_deadline_seconds)),
            },
            replace_pause: Duration::from_secs(l.replace_pause_seconds),
            poll_interval: Duration::from_millis(l.job_poll_interval_ms),
            job_timeout: Duration::from_secs(l.job_timeout_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.freshdesk.page_size, 100);
        assert_eq!(settings.bigquery.endpoint, BIGQUERY_ENDPOINT);
        assert_eq!(settings.bigquery.schema_file, PathBuf::from("schema.json"));
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.loader.replace_pause_seconds, 15);
        settings.validate().unwrap();
    }

    #[test]
    fn test_parse_yaml_partial() {
        let yaml = r#"
freshdesk:
  domain: acme
  rate_limit_rps: 4
loader:
  replace_pause_seconds: 0
server:
  port: 9000
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.freshdesk.domain.as_deref(), Some("acme"));
        assert_eq!(settings.freshdesk.page_size, 100);
        assert_eq!(settings.freshdesk.rate_limit_rps, Some(4));
        assert_eq!(settings.loader.replace_pause_seconds, 0);
        assert_eq!(settings.loader.insert_max_attempts, 100);
        assert_eq!(settings.server.port, 9000);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bigquery:\n  schema_file: /etc/schemas.json").unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(
            settings.bigquery.schema_file,
            PathBuf::from("/etc/schemas.json")
        );
    }

    #[test]
    fn test_from_missing_file() {
        let err = Settings::from_file("/nonexistent/settings.yaml").unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_apply_env() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[
                ("FRESHDESK_API_KEY", "secret"),
                ("FRESHDESK_COMPANY", "acme"),
                ("BIGQUERY_ENDPOINT", "http://localhost:9050"),
                ("BIGQUERY_ACCESS_TOKEN", "ya29.x"),
                ("SCHEMA_FILE", "/tmp/schema.json"),
                ("PORT", "3000"),
            ]))
            .unwrap();

        assert_eq!(settings.freshdesk.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.freshdesk.domain.as_deref(), Some("acme"));
        assert_eq!(settings.bigquery.endpoint, "http://localhost:9050");
        assert_eq!(settings.bigquery.access_token.as_deref(), Some("ya29.x"));
        assert_eq!(
            settings.bigquery.schema_file,
            PathBuf::from("/tmp/schema.json")
        );
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn test_apply_env_legacy_api_key_and_precedence() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[
                ("api_key", "legacy"),
                ("FRESHDESK_DOMAIN", "acme.freshdesk.com"),
                ("FRESHDESK_COMPANY", "ignored"),
            ]))
            .unwrap();
        assert_eq!(settings.freshdesk.api_key.as_deref(), Some("legacy"));
        assert_eq!(
            settings.freshdesk.domain.as_deref(),
            Some("acme.freshdesk.com")
        );

        settings
            .apply_env(env(&[("FRESHDESK_API_KEY", "new"), ("api_key", "legacy")]))
            .unwrap();
        assert_eq!(settings.freshdesk.api_key.as_deref(), Some("new"));
    }

    #[test]
    fn test_apply_env_blank_values_ignored() {
        let mut settings = Settings::default();
        settings.freshdesk.api_key = Some("from-file".to_string());
        settings
            .apply_env(env(&[("FRESHDESK_API_KEY", "   ")]))
            .unwrap();
        assert_eq!(settings.freshdesk.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_apply_env_invalid_port() {
        let mut settings = Settings::default();
        let err = settings.apply_env(env(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_validate_page_size() {
        let mut settings = Settings::default();
        settings.freshdesk.page_size = 0;
        assert!(settings.validate().is_err());
        settings.freshdesk.page_size = 101;
        assert!(settings.validate().is_err());
        settings.freshdesk.page_size = 30;
        settings.validate().unwrap();
    }

    #[test]
    fn test_freshdesk_base_url() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.freshdesk_base_url(),
            Err(Error::MissingConfigField { .. })
        ));

        settings.freshdesk.domain = Some("acme".to_string());
        assert_eq!(
            settings.freshdesk_base_url().unwrap(),
            "https://acme.freshdesk.com"
        );

        settings.freshdesk.domain = Some("support.acme.io".to_string());
        assert_eq!(
            settings.freshdesk_base_url().unwrap(),
            "https://support.acme.io"
        );

        settings.freshdesk.domain = Some("http://127.0.0.1:8080/".to_string());
        assert_eq!(
            settings.freshdesk_base_url().unwrap(),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn test_freshdesk_auth() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.freshdesk_auth(),
            Err(Error::MissingConfigField { .. })
        ));

        settings.freshdesk.api_key = Some("abc".to_string());
        match settings.freshdesk_auth().unwrap() {
            AuthConfig::Basic { username, password } => {
                assert_eq!(username, "abc");
                assert_eq!(password, "X");
            }
            other => panic!("Expected Basic, got {other:?}"),
        }
    }

    #[test]
    fn test_bigquery_auth_precedence() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.bigquery_auth().unwrap(),
            AuthConfig::MetadataServer { .. }
        ));

        settings.bigquery.credentials_file = Some(PathBuf::from("/nonexistent/key.json"));
        assert!(settings.bigquery_auth().is_err());

        settings.bigquery.access_token = Some("ya29.x".to_string());
        assert!(matches!(
            settings.bigquery_auth().unwrap(),
            AuthConfig::Bearer { .. }
        ));
    }

    #[test]
    fn test_freshdesk_client_config_rate_limit() {
        let mut settings = Settings::default();
        settings.freshdesk.domain = Some("acme".to_string());
        settings.freshdesk.rate_limit_rps = Some(3);

        let config = settings.freshdesk_client_config().unwrap();
        assert_eq!(
            config.base_url.as_deref(),
            Some("https://acme.freshdesk.com")
        );
        assert_eq!(config.rate_limit, Some(RateLimiterConfig::new(3, 3)));
    }

    #[test]
    fn test_loader_config() {
        let config = Settings::default().loader_config();
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.replace_pause, Duration::from_secs(15));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let mut settings = Settings::default();
        settings.freshdesk.api_key = Some("super-secret".to_string());
        settings.bigquery.access_token = Some("ya29.secret".to_string());

        let debug = format!("{settings:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("ya29.secret"));
    }
}
