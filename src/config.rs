use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Shared secret checked against each request's token by exact string
    /// equality.
    #[serde(default = "default_api_token")]
    pub api_token: String,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Bound on the media-download step of /send-media, seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api_token: default_api_token(),
            session: SessionConfig::default(),
            bridge: BridgeConfig::default(),
            webhook: WebhookConfig::default(),
            download_timeout_seconds: default_download_timeout(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_saphyr::from_str(&contents)?)
    }

    /// Apply environment overrides on top of the file: `PORT`, `API_TOKEN`,
    /// `SESSION_DIR`, `BROWSER_PATH`, `BRIDGE_URL`, `WEBHOOK_URL`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                value: port,
            })?;
        }
        if let Some(token) = lookup("API_TOKEN") {
            self.api_token = token;
        }
        if let Some(dir) = lookup("SESSION_DIR") {
            self.session.dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("BROWSER_PATH") {
            self.session.browser_path = Some(path);
        }
        if let Some(url) = lookup("BRIDGE_URL") {
            self.bridge.url = url;
        }
        if let Some(url) = lookup("WEBHOOK_URL") {
            self.webhook.url = Some(url);
        }
        Ok(())
    }
}

fn default_api_token() -> String {
    "test123".to_string()
}

fn default_download_timeout() -> u64 {
    30
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// How long in-flight requests get to finish after a termination
    /// signal. 0 exits without draining.
    #[serde(default)]
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            shutdown_grace_seconds: 0,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    60
}

// ============================================================================
// SessionConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    /// Directory for the persisted authentication state. Opaque to the
    /// gateway; only ever passed to the bridge.
    #[serde(default = "default_session_dir")]
    pub dir: PathBuf,
    /// Key under which the session credential store is kept.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Browser executable for the bridge to launch; its default when unset.
    #[serde(default)]
    pub browser_path: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: default_session_dir(),
            client_id: default_client_id(),
            browser_path: None,
            headless: default_headless(),
        }
    }
}

fn default_session_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_client_id() -> String {
    "wagate".to_string()
}

fn default_headless() -> bool {
    true
}

// ============================================================================
// BridgeConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the whatsapp-web.js sidecar.
    #[serde(default = "default_bridge_url")]
    pub url: String,
    #[serde(default = "default_bridge_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            request_timeout_seconds: default_bridge_timeout(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_bridge_timeout() -> u64 {
    30
}

// ============================================================================
// WebhookConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct WebhookConfig {
    /// Where received messages are forwarded; forwarding is off when unset.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: default_webhook_timeout(),
        }
    }
}

fn default_webhook_timeout() -> u64 {
    5
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.request_timeout_seconds, 60);
        assert_eq!(config.server.shutdown_grace_seconds, 0);
        assert_eq!(config.api_token, "test123");
        assert_eq!(config.session.dir, PathBuf::from("./data"));
        assert_eq!(config.session.client_id, "wagate");
        assert!(config.session.browser_path.is_none());
        assert!(config.session.headless);
        assert_eq!(config.bridge.url, "http://127.0.0.1:3001");
        assert!(config.webhook.url.is_none());
        assert_eq!(config.download_timeout_seconds, 30);
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_defaults() {
        let tmp_dir = TempDir::new().unwrap();
        let missing_path = tmp_dir.path().join("missing-config.yaml");
        let config = Config::load(missing_path.to_str().unwrap()).await.unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
    }

    #[tokio::test]
    async fn test_load_valid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  host: "0.0.0.0"
  port: 8080
  request_timeout_seconds: 120
  shutdown_grace_seconds: 10
api_token: "secret"
session:
  dir: "/var/lib/wagate"
  client_id: "main"
  browser_path: "/usr/bin/chromium"
bridge:
  url: "http://10.0.0.2:3001"
webhook:
  url: "http://automation.local/hook"
  timeout_seconds: 2
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.request_timeout_seconds, 120);
        assert_eq!(config.server.shutdown_grace_seconds, 10);
        assert_eq!(config.api_token, "secret");
        assert_eq!(config.session.dir, PathBuf::from("/var/lib/wagate"));
        assert_eq!(config.session.client_id, "main");
        assert_eq!(
            config.session.browser_path.as_deref(),
            Some("/usr/bin/chromium")
        );
        assert_eq!(config.bridge.url, "http://10.0.0.2:3001");
        assert_eq!(
            config.webhook.url.as_deref(),
            Some("http://automation.local/hook")
        );
        assert_eq!(config.webhook.timeout_seconds, 2);
    }

    #[tokio::test]
    async fn test_load_partial_yaml_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  port: 9000
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(config.server.host, "127.0.0.1"); // default
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.api_token, "test123"); // default
        assert_eq!(config.session.dir, PathBuf::from("./data")); // default
    }

    #[tokio::test]
    async fn test_load_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(file.path().to_str().unwrap()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let mut config = Config::default();
        config
            .apply_env_from(|name| match name {
                "PORT" => Some("4000".to_string()),
                "API_TOKEN" => Some("supersecret".to_string()),
                "SESSION_DIR" => Some("/tmp/wa".to_string()),
                "BROWSER_PATH" => Some("/opt/chrome".to_string()),
                "WEBHOOK_URL" => Some("http://hook.local".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.api_token, "supersecret");
        assert_eq!(config.session.dir, PathBuf::from("/tmp/wa"));
        assert_eq!(config.session.browser_path.as_deref(), Some("/opt/chrome"));
        assert_eq!(config.webhook.url.as_deref(), Some("http://hook.local"));
        assert_eq!(config.bridge.url, "http://127.0.0.1:3001"); // untouched
    }

    #[test]
    fn test_env_override_bad_port() {
        let mut config = Config::default();
        let result = config.apply_env_from(|name| match name {
            "PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
    }

    #[test]
    fn test_config_error_display() {
        let io_error = ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "test",
        ));
        assert!(io_error.to_string().contains("failed to read config file"));
    }
}
