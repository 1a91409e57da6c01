//! Authorizer configuration
//!
//! The gateway recognizes a small set of options: where to fetch the issuer's key
//! set, which single signing algorithm is accepted, how long fetched keys are
//! trusted, how long a fetch may take, and optional issuer/audience requirements.
//!
//! Configuration can be built programmatically with [`AuthorizerConfig::builder`],
//! or loaded from a TOML/YAML/JSON file layered with `QUILLPAD_`-prefixed
//! environment variables (12-factor style).

use std::path::Path;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::error::ConfigError;

/// Default environment variable prefix
pub const ENV_PREFIX: &str = "QUILLPAD";

/// What the key-set cache does when a refresh fails after the TTL has elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StaleKeysPolicy {
    /// Never serve expired keys; a failed refresh fails the authorization call
    #[default]
    Reject,
    /// Serve the last good key set for up to `max_stale` past its TTL
    ServeStale {
        /// How long past expiry the last good key set may still be used
        #[serde(with = "duration_secs")]
        max_stale: Duration,
    },
}

/// Authorization gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizerConfig {
    /// Issuer key-set (JWKS) endpoint
    pub key_set_url: String,
    /// The only signing algorithm accepted
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    /// How long a fetched key set is used before it is refreshed
    #[serde(default = "default_cache_ttl", with = "duration_secs")]
    pub cache_ttl: Duration,
    /// Upper bound on a single key-set fetch
    #[serde(default = "default_fetch_timeout", with = "duration_secs")]
    pub fetch_timeout: Duration,
    /// Required `iss` claim
    #[serde(default)]
    pub issuer: Option<String>,
    /// Required member of the `aud` claim
    #[serde(default)]
    pub audience: Option<String>,
    /// Clock skew tolerance applied to `exp` and `nbf`
    #[serde(default, with = "duration_secs")]
    pub leeway: Duration,
    /// Behavior when a refresh fails
    #[serde(default)]
    pub stale_keys: StaleKeysPolicy,
    /// Refresh the key set once when a token's `kid` is unknown (key rotation)
    #[serde(default)]
    pub refresh_on_unknown_kid: bool,
    /// Minimum age of the cached key set before a rotation refresh may fetch again
    #[serde(default = "default_min_refresh_interval", with = "duration_secs")]
    pub min_refresh_interval: Duration,
}

fn default_algorithm() -> Algorithm {
    Algorithm::RS256
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_min_refresh_interval() -> Duration {
    Duration::from_secs(30)
}

impl AuthorizerConfig {
    /// Create a configuration builder for the given key-set URL
    ///
    /// # Example
    ///
    /// ```rust
    /// use quillpad_auth::AuthorizerConfig;
    /// use std::time::Duration;
    ///
    /// let config = AuthorizerConfig::builder("https://issuer.example.com/.well-known/jwks.json")
    ///     .cache_ttl(Duration::from_secs(300))
    ///     .audience("https://api.example.com")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.cache_ttl, Duration::from_secs(300));
    /// ```
    pub fn builder(key_set_url: impl Into<String>) -> AuthorizerConfigBuilder {
        AuthorizerConfigBuilder::new(key_set_url)
    }

    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// Environment variables with the `QUILLPAD_` prefix override file settings,
    /// e.g. `QUILLPAD_CACHE_TTL=120`. Nested fields use `__` as separator
    /// (`QUILLPAD_STALE_KEYS__MODE=serve_stale`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, has an unsupported extension,
    /// fails to parse, or describes an invalid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`AuthorizerConfig::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(environment(env_prefix))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `QUILLPAD_`-prefixed environment variables only
    ///
    /// # Errors
    ///
    /// Returns an error if `QUILLPAD_KEY_SET_URL` is missing or the resulting
    /// configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(environment(ENV_PREFIX))
            .build()?;
        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the gateway refuses to run with
    ///
    /// # Errors
    ///
    /// - key-set URL is not a URL, or uses plain HTTP to a non-loopback host
    /// - algorithm is symmetric (HS256/384/512)
    /// - cache TTL, fetch timeout or minimum refresh interval is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.key_set_url)
            .map_err(|e| ConfigError::Invalid(format!("key_set_url: {e}")))?;

        match url.scheme() {
            "https" => {}
            "http" if is_loopback(&url) => {}
            scheme => {
                return Err(ConfigError::Invalid(format!(
                    "key_set_url must use https (http only allowed for loopback), got {scheme}"
                )));
            }
        }

        if matches!(
            self.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(ConfigError::Invalid(format!(
                "algorithm {:?} is symmetric; only public-key algorithms can be verified against a key set",
                self.algorithm
            )));
        }

        if self.cache_ttl.is_zero() {
            return Err(ConfigError::Invalid("cache_ttl must be non-zero".into()));
        }

        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid("fetch_timeout must be non-zero".into()));
        }

        // Zero would let every unknown `kid` trigger a fetch
        if self.min_refresh_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "min_refresh_interval must be non-zero".into(),
            ));
        }

        Ok(())
    }
}

fn environment(prefix: &str) -> config::Environment {
    config::Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Builder for [`AuthorizerConfig`]
#[derive(Debug, Clone)]
pub struct AuthorizerConfigBuilder {
    config: AuthorizerConfig,
}

impl AuthorizerConfigBuilder {
    /// Start from defaults with the given key-set URL
    pub fn new(key_set_url: impl Into<String>) -> Self {
        Self {
            config: AuthorizerConfig {
                key_set_url: key_set_url.into(),
                algorithm: default_algorithm(),
                cache_ttl: default_cache_ttl(),
                fetch_timeout: default_fetch_timeout(),
                issuer: None,
                audience: None,
                leeway: Duration::ZERO,
                stale_keys: StaleKeysPolicy::Reject,
                refresh_on_unknown_kid: false,
                min_refresh_interval: default_min_refresh_interval(),
            },
        }
    }

    /// Set the accepted signing algorithm
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    /// Set the key-set cache TTL
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Set the key-set fetch timeout
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Require the `iss` claim to equal `issuer`
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.issuer = Some(issuer.into());
        self
    }

    /// Require the `aud` claim to contain `audience`
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.config.audience = Some(audience.into());
        self
    }

    /// Set the clock skew tolerance
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.config.leeway = leeway;
        self
    }

    /// Set the stale-keys policy
    pub fn stale_keys(mut self, policy: StaleKeysPolicy) -> Self {
        self.config.stale_keys = policy;
        self
    }

    /// Refresh once on an unknown `kid`, at most every `min_interval`
    pub fn refresh_on_unknown_kid(mut self, min_interval: Duration) -> Self {
        self.config.refresh_on_unknown_kid = true;
        self.config.min_refresh_interval = min_interval;
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// See [`AuthorizerConfig::validate`].
    pub fn build(self) -> Result<AuthorizerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Serde helper: durations as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const URL: &str = "https://issuer.example.com/.well-known/jwks.json";

    #[test]
    fn test_builder_defaults() {
        let config = AuthorizerConfig::builder(URL).build().unwrap();
        assert_eq!(config.algorithm, Algorithm::RS256);
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.leeway, Duration::ZERO);
        assert_eq!(config.stale_keys, StaleKeysPolicy::Reject);
        assert!(!config.refresh_on_unknown_kid);
        assert!(config.issuer.is_none());
        assert!(config.audience.is_none());
    }

    #[test]
    fn test_rejects_plain_http_to_remote_host() {
        let err = AuthorizerConfig::builder("http://issuer.example.com/jwks")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_allows_plain_http_to_loopback() {
        for url in [
            "http://localhost:8080/jwks",
            "http://127.0.0.1:9999/jwks",
            "http://[::1]:9999/jwks",
        ] {
            assert!(AuthorizerConfig::builder(url).build().is_ok(), "{url}");
        }
    }

    #[test]
    fn test_rejects_symmetric_algorithms() {
        for alg in [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512] {
            let err = AuthorizerConfig::builder(URL)
                .algorithm(alg)
                .build()
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)));
        }
    }

    #[test]
    fn test_rejects_zero_ttl_and_timeout() {
        assert!(
            AuthorizerConfig::builder(URL)
                .cache_ttl(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(
            AuthorizerConfig::builder(URL)
                .fetch_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_rejects_zero_min_refresh_interval() {
        let err = AuthorizerConfig::builder(URL)
            .refresh_on_unknown_kid(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let mut config = AuthorizerConfig::builder(URL).build().unwrap();
        config.min_refresh_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unparseable_url() {
        assert!(AuthorizerConfig::builder("not a url").build().is_err());
    }

    #[test]
    fn test_from_file_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
key_set_url = "{URL}"
algorithm = "ES256"
cache_ttl = 120
fetch_timeout = 2
audience = "https://api.example.com"

[stale_keys]
mode = "serve_stale"
max_stale = 60
"#
        )
        .unwrap();

        let config =
            AuthorizerConfig::from_file_with_prefix(file.path(), "QUILLPAD_TEST_TOML").unwrap();
        assert_eq!(config.algorithm, Algorithm::ES256);
        assert_eq!(config.cache_ttl, Duration::from_secs(120));
        assert_eq!(config.fetch_timeout, Duration::from_secs(2));
        assert_eq!(config.audience.as_deref(), Some("https://api.example.com"));
        assert_eq!(
            config.stale_keys,
            StaleKeysPolicy::ServeStale {
                max_stale: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn test_from_file_missing() {
        let err = AuthorizerConfig::from_file("/nonexistent/quillpad.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_from_file_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = AuthorizerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat));
    }

    #[test]
    fn test_json_roundtrip_uses_seconds() {
        let config = AuthorizerConfig::builder(URL).build().unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["cache_ttl"], 600);
        assert_eq!(json["algorithm"], "RS256");
        assert_eq!(json["stale_keys"]["mode"], "reject");
    }
}
