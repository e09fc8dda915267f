use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{RelayError, RelayResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Broker connections, in order. Every connection feeds the same dispatch queue.
    #[serde(default = "default_connections")]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub anchors: AnchorsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connections: default_connections(),
            channel: ChannelConfig::default(),
            fetch: FetchConfig::default(),
            automation: AutomationConfig::default(),
            anchors: AnchorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    /// Falls back to env var WXDISPATCH_<N>_PASSWORD (N is the 1-based position).
    #[serde(default)]
    pub password: Option<String>,
    pub subscribe_topic: String,
    /// MQTT client id. Generated per process when absent.
    #[serde(default)]
    pub client_id: Option<String>,
}

fn default_port() -> u16 {
    1883
}

/// Loopback test endpoint used when no local configuration exists.
fn default_connections() -> Vec<ConnectionConfig> {
    vec![ConnectionConfig {
        server: "127.0.0.1".into(),
        port: default_port(),
        username: None,
        password: None,
        subscribe_topic: "wx/test/message".into(),
        client_id: None,
    }]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,
    /// Fixed delay between connection attempts. Never grows.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_health_interval() -> u64 {
    30
}

fn default_reconnect_delay() -> u64 {
    2
}

fn default_keep_alive() -> u64 {
    60
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: default_health_interval(),
            reconnect_delay_secs: default_reconnect_delay(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl ChannelConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

fn default_max_concurrency() -> usize {
    5
}

fn default_fetch_timeout() -> u64 {
    30
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_fetch_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Top-level window title of the chat client.
    #[serde(default = "default_window_name")]
    pub window_name: String,
    #[serde(default)]
    pub window_class: Option<String>,
    /// Executable started when the window cannot be found.
    #[serde(default)]
    pub launch_path: Option<PathBuf>,
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_ms: u64,
    #[serde(default = "default_launch_poll")]
    pub launch_poll_ms: u64,
    /// Pause after each keystroke and before reading the screen after a paste.
    #[serde(default = "default_base_interval")]
    pub base_interval_ms: u64,
    #[serde(default = "default_text_interval")]
    pub text_interval_ms: u64,
    #[serde(default = "default_file_interval")]
    pub file_interval_ms: u64,
    #[serde(default = "default_anchor_timeout")]
    pub anchor_timeout_ms: u64,
    #[serde(default = "default_anchor_poll")]
    pub anchor_poll_ms: u64,
}

fn default_window_name() -> String {
    "微信".into()
}

fn default_launch_timeout() -> u64 {
    10_000
}

fn default_launch_poll() -> u64 {
    500
}

fn default_base_interval() -> u64 {
    100
}

fn default_text_interval() -> u64 {
    50
}

fn default_file_interval() -> u64 {
    500
}

fn default_anchor_timeout() -> u64 {
    3_000
}

fn default_anchor_poll() -> u64 {
    250
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            window_name: default_window_name(),
            window_class: None,
            launch_path: None,
            launch_timeout_ms: default_launch_timeout(),
            launch_poll_ms: default_launch_poll(),
            base_interval_ms: default_base_interval(),
            text_interval_ms: default_text_interval(),
            file_interval_ms: default_file_interval(),
            anchor_timeout_ms: default_anchor_timeout(),
            anchor_poll_ms: default_anchor_poll(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorsConfig {
    #[serde(default = "default_search_result_anchor")]
    pub search_result: AnchorConfig,
    #[serde(default = "default_compose_toolbar_anchor")]
    pub compose_toolbar: AnchorConfig,
}

impl Default for AnchorsConfig {
    fn default() -> Self {
        Self {
            search_result: default_search_result_anchor(),
            compose_toolbar: default_compose_toolbar_anchor(),
        }
    }
}

/// One reference image plus the thresholds used to act on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfig {
    pub image: PathBuf,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Pixels below the anchor's bottom edge where the click lands.
    #[serde(default = "default_click_offset")]
    pub click_offset_y: i32,
}

fn default_confidence() -> f32 {
    0.8
}

fn default_click_offset() -> i32 {
    50
}

fn default_search_result_anchor() -> AnchorConfig {
    AnchorConfig {
        image: PathBuf::from("assets/images/group.png"),
        confidence: default_confidence(),
        click_offset_y: default_click_offset(),
    }
}

fn default_compose_toolbar_anchor() -> AnchorConfig {
    AnchorConfig {
        image: PathBuf::from("assets/images/emoji.png"),
        confidence: default_confidence(),
        click_offset_y: default_click_offset(),
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in working directory");
            return Some(candidate);
        }
    }

    let candidate = dirs::config_dir()?.join("wxdispatch").join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in user config directory");
        return Some(candidate);
    }
    None
}

pub fn parse_config(content: &str) -> RelayResult<AppConfig> {
    let mut config: AppConfig = toml::from_str(content)?;
    if config.connections.is_empty() {
        return Err(RelayError::Config("at least one [[connections]] entry is required".into()));
    }
    if config.fetch.max_concurrency == 0 {
        config.fetch.max_concurrency = 1;
    }
    Ok(config)
}

/// Load `config.toml`, falling back to the loopback defaults when no file exists.
pub fn load_config() -> RelayResult<AppConfig> {
    let mut config = match resolve_config_path() {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            let config = parse_config(&content)?;
            tracing::info!(
                path = %path.display(),
                connections = config.connections.len(),
                "config loaded"
            );
            config
        }
        None => {
            tracing::warn!("config.toml not found; using loopback defaults");
            AppConfig::default()
        }
    };

    for (idx, conn) in config.connections.iter_mut().enumerate() {
        if let Ok(password) = std::env::var(format!("WXDISPATCH_{}_PASSWORD", idx + 1)) {
            conn.password = Some(password);
        }
    }
    Ok(config)
}
