use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

/// Environment prefix for overrides, e.g. `PARTNERGATE_SERVICE__PASSWORD`.
pub const ENV_PREFIX: &str = "PARTNERGATE_";

fn default_port() -> u16 {
    8030
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_base_url() -> String {
    "https://api.foodlyapp.ge".to_string()
}
fn default_api_prefix() -> String {
    "/api/partner".to_string()
}
fn default_login_path() -> String {
    "login".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_token_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Connection settings for the upstream restaurant-management API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API root, e.g. `https://api.example.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path prefix of partner endpoints. Deployments differ (`/api/partner`
    /// vs `/partner`), so it is never hard-coded by callers.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Login endpoint, relative to `api_prefix`.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Per-call timeout in seconds (defaults to 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            login_path: default_login_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl UpstreamConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Service-account identity used when no user session token is supplied.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Lifetime of a renewed token when the login response carries no expiry
    /// (defaults to 7 days).
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// Cached token file (defaults to `~/.partnergate/service_token.json`).
    #[serde(default)]
    pub token_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            token_ttl_secs: default_token_ttl_secs(),
            token_path: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("token_path", &self.token_path)
            .finish()
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Configured token file, or the per-user default.
    #[must_use]
    pub fn token_path(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(default_token_path)
    }
}

fn default_token_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".partnergate")
        .join("service_token.json")
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Optional log file; stderr is used when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen port (defaults to 8030).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen address (defaults to `127.0.0.1`).
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            upstream: UpstreamConfig::default(),
            service: ServiceConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads defaults, then the optional file, then `PARTNERGATE_*` environment
    /// overrides (`__` separates nested keys).
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file or an override cannot be parsed.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Env, Format as _, Serialized, Yaml},
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
port: 9000
host: "0.0.0.0"
upstream:
  base_url: "https://api.test.com/"
  api_prefix: "/partner"
  timeout_secs: 5
service:
  email: "svc@example.com"
  password: "hunter2"
  token_ttl_secs: 3600
  token_path: "/tmp/pg/token.json"
log:
  level: debug
  format: json
"#;

    #[test]
    fn test_default_config() {
        let c = Config::default();
        assert_eq!(c.port, 8030);
        assert_eq!(c.host, "127.0.0.1");
        assert_eq!(c.upstream.api_prefix, "/api/partner");
        assert_eq!(c.upstream.login_path, "login");
        assert_eq!(c.upstream.timeout(), Duration::from_secs(30));
        assert_eq!(c.service.token_ttl(), Duration::from_secs(604_800));
        assert!(c.service.email.is_none());
        assert_eq!(c.log.format, LogFormat::Pretty);
    }

    #[test]
    fn test_from_yaml_sections() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.upstream.base_url, "https://api.test.com/");
        assert_eq!(c.upstream.api_prefix, "/partner");
        assert_eq!(c.upstream.timeout_secs, 5);
        assert_eq!(c.service.email.as_deref(), Some("svc@example.com"));
        assert_eq!(c.service.token_ttl_secs, 3600);
        assert_eq!(c.service.token_path(), PathBuf::from("/tmp/pg/token.json"));
        assert_eq!(c.log.level, "debug");
        assert_eq!(c.log.format, LogFormat::Json);
    }

    #[test]
    fn test_from_yaml_defaults_applied() {
        let c = Config::from_yaml("upstream:\n  timeout_secs: 12\n").unwrap();
        assert_eq!(c.upstream.timeout_secs, 12);
        assert_eq!(c.upstream.base_url, "https://api.foodlyapp.ge"); // default preserved
        assert_eq!(c.port, 8030);
    }

    #[test]
    fn test_default_token_path_under_home() {
        let c = Config::default();
        assert!(c.service.token_path().ends_with(".partnergate/service_token.json"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        let dbg = format!("{:?}", c.service);
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn test_load_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("partnergate.yaml", "port: 9100\nupstream:\n  timeout_secs: 7\n")?;
            jail.set_env("PARTNERGATE_UPSTREAM__TIMEOUT_SECS", "11");
            jail.set_env("PARTNERGATE_SERVICE__EMAIL", "env@example.com");
            let c = Config::load(Some(Path::new("partnergate.yaml")))?;
            assert_eq!(c.port, 9100);
            assert_eq!(c.upstream.timeout_secs, 11);
            assert_eq!(c.service.email.as_deref(), Some("env@example.com"));
            Ok(())
        });
    }

    #[test]
    fn test_load_without_file() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PARTNERGATE_PORT", "9200");
            let c = Config::load(None)?;
            assert_eq!(c.port, 9200);
            Ok(())
        });
    }
}
