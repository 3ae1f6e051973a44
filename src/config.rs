//! Veilleur configuration management
//!
//! Configuration loads from a TOML file (when given) and is then overlaid
//! with environment variables. Missing or malformed values fall back to
//! defaults, or disable the dependent watcher, rather than aborting startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main veilleur configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Interactive chat configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// RSS tech-news watcher configuration
    #[serde(default)]
    pub rss: RssConfig,

    /// CVE security-feed watcher configuration
    #[serde(default)]
    pub cve: CveConfig,

    /// Weather presence watcher configuration
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Notification delivery configuration
    #[serde(default)]
    pub webhooks: WebhookConfig,

    /// Admin role identifier (feature gate for privileged commands)
    #[serde(default)]
    pub admin_role_id: Option<String>,

    /// General log channel identifier
    #[serde(default)]
    pub log_channel: Option<String>,
}

/// Interactive chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Hosted model identifier
    pub model_id: String,

    /// API token for the completion endpoint
    pub api_token: Option<String>,

    /// Completion endpoint base URL (OpenAI-style chat completions)
    pub api_base: String,

    /// Max requests per user within the rate-limit window
    pub max_requests: usize,

    /// Rate-limit window in seconds
    pub window_secs: i64,

    /// Max stored conversation turns per user
    pub session_cap: usize,

    /// Conversation inactivity timeout in seconds
    pub session_timeout_secs: i64,

    /// Max accepted question length in characters
    pub max_question_len: usize,

    /// Completion call timeout in seconds
    pub completion_timeout_secs: u64,

    /// Max tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model_id: "meta-llama/Meta-Llama-3-8B-Instruct".to_string(),
            api_token: None,
            api_base: "https://router.huggingface.co/v1".to_string(),
            max_requests: 5,
            window_secs: 60,
            session_cap: 20,
            session_timeout_secs: 600,
            max_question_len: 500,
            completion_timeout_secs: 30,
            max_tokens: 600,
            temperature: 0.7,
        }
    }
}

/// RSS watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RssConfig {
    /// Target channel for article posts; `None` disables the watcher
    pub channel: Option<String>,

    /// Log channel for watcher status lines
    pub log_channel: Option<String>,

    /// Monitored feed URLs
    pub feed_urls: Vec<String>,

    /// Day-of-week gate for the scheduled path (force-run bypasses it)
    pub gate_weekday: chrono::Weekday,

    /// Daily wall-clock fire hour (UTC)
    pub daily_hour: u32,

    /// Daily wall-clock fire minute (UTC)
    pub daily_minute: u32,

    /// One-shot grace period before the first scheduled run, in seconds
    pub initial_delay_secs: u64,

    /// Only articles published within this many hours are considered
    pub window_hours: i64,

    /// Durable dedup file path
    pub processed_file: PathBuf,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            channel: None,
            log_channel: None,
            feed_urls: vec![
                "https://www.lemondeinformatique.fr/flux-rss/reseaux/rss.xml".to_string(),
                "https://www.lemondeinformatique.fr/flux-rss/os/rss.xml".to_string(),
                "https://www.lemondeinformatique.fr/flux-rss/services-it/rss.xml".to_string(),
            ],
            gate_weekday: chrono::Weekday::Fri,
            daily_hour: 8,
            daily_minute: 0,
            initial_delay_secs: 300,
            window_hours: 168,
            processed_file: PathBuf::from("data/processed_articles.json"),
        }
    }
}

/// CVE watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CveConfig {
    /// Latest-CVEs API endpoint
    pub api_url: String,

    /// Target channel for alerts; `None` disables the watcher
    pub channel: Option<String>,

    /// Poll interval in seconds
    pub poll_interval_secs: u64,
}

impl Default for CveConfig {
    fn default() -> Self {
        Self {
            api_url: "https://cve.circl.lu/api/last".to_string(),
            channel: None,
            poll_interval_secs: 300,
        }
    }
}

/// Weather watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key; `None` disables the watcher
    pub api_key: Option<String>,

    /// Location query (e.g. "Tours,FR")
    pub location: String,

    /// Log channel for presence-update notices
    pub log_channel: Option<String>,

    /// Poll interval in seconds
    pub poll_interval_secs: u64,

    /// One-shot grace period before the first run, in seconds
    pub initial_delay_secs: u64,

    /// Fetch timeout in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            location: "Tours,FR".to_string(),
            log_channel: None,
            poll_interval_secs: 300,
            initial_delay_secs: 5,
            fetch_timeout_secs: 15,
        }
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Channel identifier -> webhook URL
    pub channels: std::collections::HashMap<String, String>,

    /// Endpoint receiving presence text updates
    pub presence_url: Option<String>,
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Overlay environment variables onto this configuration.
    ///
    /// Variable names follow the deployment surface: `VEILLE_CHANNEL_ID`,
    /// `VEILLE_CVE_CHANNEL_ID`, `OPENWEATHER_API_KEY`, `HF_TOKEN`, etc.
    /// Malformed values are logged and ignored.
    pub fn overlay_env(mut self) -> Self {
        if let Some(v) = env_opt("HF_TOKEN") {
            self.chat.api_token = Some(v);
        }
        if let Some(v) = env_opt("VEILLE_CHANNEL_ID") {
            self.rss.channel = Some(v);
        }
        if let Some(v) = env_opt("RSS_LOG_CHANNEL_ID") {
            self.rss.log_channel = Some(v);
        }
        if let Some(v) = env_opt("VEILLE_CVE_CHANNEL_ID") {
            self.cve.channel = Some(v);
        }
        if let Some(v) = env_opt("OPENWEATHER_API_KEY") {
            self.weather.api_key = Some(v);
        }
        if let Some(v) = env_opt("WEATHER_LOCATION") {
            self.weather.location = v;
        }
        if let Some(mins) = env_parse::<u64>("WEATHER_INTERVAL_MIN") {
            self.weather.poll_interval_secs = mins * 60;
        }
        if let Some(v) = env_opt("WEATHER_LOG_CHANNEL_ID") {
            self.weather.log_channel = Some(v);
        }
        if let Some(v) = env_opt("ADMIN_ROLE_ID") {
            self.admin_role_id = Some(v);
        }
        if let Some(v) = env_opt("LOG_CHANNEL_ID") {
            self.log_channel = Some(v);
        }
        self
    }
}

/// Read a non-empty environment variable.
fn env_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Read and parse an environment variable, logging a warning when the
/// value is present but malformed.
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_opt(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring malformed environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.chat.max_requests, 5);
        assert_eq!(config.chat.window_secs, 60);
        assert_eq!(config.chat.session_cap, 20);
        assert_eq!(config.chat.session_timeout_secs, 600);
        assert_eq!(config.rss.gate_weekday, chrono::Weekday::Fri);
        assert_eq!(config.rss.feed_urls.len(), 3);
        assert_eq!(config.cve.poll_interval_secs, 300);
        assert!(config.rss.channel.is_none());
        assert!(config.weather.api_key.is_none());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let toml = r#"
            [cve]
            channel = "123"
        "#;
        let config: BotConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.cve.channel.as_deref(), Some("123"));
        assert_eq!(config.cve.api_url, "https://cve.circl.lu/api/last");
        assert_eq!(config.chat.max_tokens, 600);
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("VEILLEUR_TEST_BAD_INT", "not-a-number");
        assert_eq!(env_parse::<u64>("VEILLEUR_TEST_BAD_INT"), None);
        std::env::remove_var("VEILLEUR_TEST_BAD_INT");
    }
}
