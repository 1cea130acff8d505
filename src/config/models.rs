use super::defaults;
use serde::Deserialize;

/// Flattened view of `conf/config.toml`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub server_url: String,
    /// Path of a server-sent event stream of queue status; polling is used
    /// when unset.
    pub status_events_path: Option<String>,
    /// Seconds between queue status polls; 0 disables status tracking.
    pub status_poll_secs: u64,
    pub volume: f32,
    /// Resume the saved position as soon as the player starts.
    pub autoplay: bool,
    pub log_level: LogLevel,
    pub cache_dir: String,
    pub key_toggle_play_pause: String,
    pub key_stop: String,
    pub key_next: String,
    pub key_prev: String,
    pub key_resume: String,
    pub key_toggle_auto_scroll: String,
    pub key_status: String,
    pub key_quit: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: defaults::default_server_url(),
            status_events_path: None,
            status_poll_secs: defaults::default_status_poll_secs(),
            volume: defaults::default_volume(),
            autoplay: defaults::default_autoplay(),
            log_level: defaults::default_log_level(),
            cache_dir: defaults::default_cache_dir(),
            key_toggle_play_pause: defaults::default_key_toggle_play_pause(),
            key_stop: defaults::default_key_stop(),
            key_next: defaults::default_key_next(),
            key_prev: defaults::default_key_prev(),
            key_resume: defaults::default_key_resume(),
            key_toggle_auto_scroll: defaults::default_key_toggle_auto_scroll(),
            key_status: defaults::default_key_status(),
            key_quit: defaults::default_key_quit(),
        }
    }
}

impl AppConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.server_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub fn content_url(&self, work: glowtalk_core::WorkId) -> String {
        self.endpoint(&format!("api/audiobooks/{work}/content"))
    }

    pub fn status_url(&self) -> String {
        self.endpoint("api/queue/status")
    }

    pub fn status_events_url(&self) -> Option<String> {
        self.status_events_path
            .as_deref()
            .map(|path| self.endpoint(path))
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
