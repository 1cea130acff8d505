//! Maps typed command lines onto session commands using the configured keys.

use crate::config::AppConfig;
use glowtalk_core::SessionCommand;

#[derive(Debug, Clone)]
pub(super) enum Input {
    Command(SessionCommand),
    /// Play the clip with this sequence index.
    PlaySequence(usize),
    Status,
    Help,
    Quit,
    Unknown(String),
}

pub(super) struct KeyMap {
    toggle_play_pause: String,
    stop: String,
    next: String,
    prev: String,
    resume: String,
    toggle_auto_scroll: String,
    status: String,
    quit: String,
}

impl KeyMap {
    pub(super) fn from_config(config: &AppConfig) -> Self {
        Self {
            toggle_play_pause: normalize_key(&config.key_toggle_play_pause, "p"),
            stop: normalize_key(&config.key_stop, "s"),
            next: normalize_key(&config.key_next, "n"),
            prev: normalize_key(&config.key_prev, "b"),
            resume: normalize_key(&config.key_resume, "r"),
            toggle_auto_scroll: normalize_key(&config.key_toggle_auto_scroll, "a"),
            status: normalize_key(&config.key_status, "i"),
            quit: normalize_key(&config.key_quit, "q"),
        }
    }

    /// `None` for blank lines.
    pub(super) fn parse(&self, line: &str) -> Option<Input> {
        let pressed = line.trim().to_ascii_lowercase();
        if pressed.is_empty() {
            return None;
        }
        if let Ok(sequence) = pressed.parse::<usize>() {
            return Some(Input::PlaySequence(sequence));
        }

        let input = if pressed == self.toggle_play_pause {
            Input::Command(SessionCommand::TogglePlayPause)
        } else if pressed == self.stop {
            Input::Command(SessionCommand::Stop)
        } else if pressed == self.next {
            Input::Command(SessionCommand::SeekNext)
        } else if pressed == self.prev {
            Input::Command(SessionCommand::SeekPrev)
        } else if pressed == self.resume {
            Input::Command(SessionCommand::ResumeFromSaved)
        } else if pressed == self.toggle_auto_scroll {
            Input::Command(SessionCommand::ToggleAutoScroll)
        } else if pressed == self.status {
            Input::Status
        } else if pressed == self.quit {
            Input::Quit
        } else if pressed == "?" || pressed == "help" {
            Input::Help
        } else {
            Input::Unknown(pressed)
        };
        Some(input)
    }

    pub(super) fn help(&self) -> String {
        format!(
            "Commands: <number> play clip | {} play/pause | {} stop | {} next | {} previous | \
             {} resume saved position | {} auto-scroll | {} status | {} quit",
            self.toggle_play_pause,
            self.stop,
            self.next,
            self.prev,
            self.resume,
            self.toggle_auto_scroll,
            self.status,
            self.quit
        )
    }
}

fn normalize_key(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    if trimmed.is_empty() || trimmed.parse::<usize>().is_ok() {
        fallback.to_string()
    } else {
        trimmed
    }
}
