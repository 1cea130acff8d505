use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    playback: PlaybackConfig,
    #[serde(default)]
    controls: ControlsConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    cache: CacheConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            server_url: tables.server.base_url,
            status_events_path: tables
                .server
                .status_events_path
                .filter(|path| !path.trim().is_empty()),
            status_poll_secs: tables.server.status_poll_secs,
            volume: tables.playback.volume.clamp(0.0, 2.0),
            autoplay: tables.playback.autoplay,
            log_level: tables.logging.log_level,
            cache_dir: tables.cache.cache_dir,
            key_toggle_play_pause: tables.controls.key_toggle_play_pause,
            key_stop: tables.controls.key_stop,
            key_next: tables.controls.key_next,
            key_prev: tables.controls.key_prev,
            key_resume: tables.controls.key_resume,
            key_toggle_auto_scroll: tables.controls.key_toggle_auto_scroll,
            key_status: tables.controls.key_status,
            key_quit: tables.controls.key_quit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
    #[serde(default = "defaults::default_server_url")]
    base_url: String,
    #[serde(default)]
    status_events_path: Option<String>,
    #[serde(default = "defaults::default_status_poll_secs")]
    status_poll_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            base_url: defaults::default_server_url(),
            status_events_path: None,
            status_poll_secs: defaults::default_status_poll_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PlaybackConfig {
    #[serde(default = "defaults::default_volume")]
    volume: f32,
    #[serde(default = "defaults::default_autoplay")]
    autoplay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            volume: defaults::default_volume(),
            autoplay: defaults::default_autoplay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ControlsConfig {
    #[serde(default = "defaults::default_key_toggle_play_pause")]
    key_toggle_play_pause: String,
    #[serde(default = "defaults::default_key_stop")]
    key_stop: String,
    #[serde(default = "defaults::default_key_next")]
    key_next: String,
    #[serde(default = "defaults::default_key_prev")]
    key_prev: String,
    #[serde(default = "defaults::default_key_resume")]
    key_resume: String,
    #[serde(default = "defaults::default_key_toggle_auto_scroll")]
    key_toggle_auto_scroll: String,
    #[serde(default = "defaults::default_key_status")]
    key_status: String,
    #[serde(default = "defaults::default_key_quit")]
    key_quit: String,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        ControlsConfig {
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

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CacheConfig {
    #[serde(default = "defaults::default_cache_dir")]
    cache_dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            cache_dir: defaults::default_cache_dir(),
        }
    }
}
