use super::models::LogLevel;

pub(crate) fn default_server_url() -> String {
    "http://localhost:8585".to_string()
}

pub(crate) fn default_status_poll_secs() -> u64 {
    10
}

pub(crate) fn default_volume() -> f32 {
    1.0
}

pub(crate) fn default_autoplay() -> bool {
    false
}

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}

pub(crate) fn default_cache_dir() -> String {
    ".cache".to_string()
}

pub(crate) fn default_key_toggle_play_pause() -> String {
    "p".to_string()
}

pub(crate) fn default_key_stop() -> String {
    "s".to_string()
}

pub(crate) fn default_key_next() -> String {
    "n".to_string()
}

pub(crate) fn default_key_prev() -> String {
    "b".to_string()
}

pub(crate) fn default_key_resume() -> String {
    "r".to_string()
}

pub(crate) fn default_key_toggle_auto_scroll() -> String {
    "a".to_string()
}

pub(crate) fn default_key_status() -> String {
    "i".to_string()
}

pub(crate) fn default_key_quit() -> String {
    "q".to_string()
}
