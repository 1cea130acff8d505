//! rodio-backed audio output running on a dedicated thread.
//!
//! rodio's `OutputStream` cannot leave the thread that opened it, so the
//! player talks to it through a command channel. Clips are fetched from the
//! server with blocking `reqwest`, decoded in memory and reported back as
//! [`AudioEvent`]s tagged with the clip token they belong to.

use anyhow::{Context, Result, anyhow};
use glowtalk_core::audio::{AudioError, AudioEvent, AudioLocator, AudioOutput, ClipToken};
use glowtalk_core::model::AudioHash;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Bounds how long a fetch can hold the audio thread, and so Stop and Drop.
const CLIP_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

enum AudioCommand {
    Load { clip: ClipToken, url: String },
    Play,
    Pause,
    Resume,
    Stop,
    Shutdown,
}

pub struct RodioOutput {
    locator: AudioLocator,
    commands: mpsc::Sender<AudioCommand>,
    worker: Option<JoinHandle<()>>,
}

impl RodioOutput {
    /// Opens the default output device on a new thread.
    pub fn spawn(
        locator: AudioLocator,
        events: UnboundedSender<AudioEvent>,
        volume: f32,
    ) -> Result<Self> {
        let http = clip_client(CLIP_TIMEOUT)?;
        let (commands, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(opened) => {
                        let _ = ready_tx.send(Ok(()));
                        opened
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err.to_string()));
                        return;
                    }
                };
                AudioWorker::new(handle, http, events, volume).run(inbox);
            })
            .context("Spawning audio thread")?;

        ready_rx
            .recv()
            .context("Audio thread exited during startup")?
            .map_err(|err| anyhow!("Opening audio output: {err}"))?;
        info!(volume, "Audio output ready");
        Ok(Self {
            locator,
            commands,
            worker: Some(worker),
        })
    }

    fn send(&self, command: AudioCommand) -> Result<(), AudioError> {
        self.commands
            .send(command)
            .map_err(|_| AudioError::Output("audio thread is gone".to_string()))
    }
}

impl AudioOutput for RodioOutput {
    fn load(&mut self, clip: ClipToken, hash: &AudioHash) -> Result<(), AudioError> {
        let url = self.locator.url_for(hash);
        self.send(AudioCommand::Load { clip, url })
    }

    fn play(&mut self) -> Result<(), AudioError> {
        self.send(AudioCommand::Play)
    }

    fn pause(&mut self) {
        let _ = self.send(AudioCommand::Pause);
    }

    fn resume(&mut self) {
        let _ = self.send(AudioCommand::Resume);
    }

    fn stop(&mut self) {
        let _ = self.send(AudioCommand::Stop);
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let _ = self.commands.send(AudioCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Audio thread panicked");
            }
        }
    }
}

struct LoadedClip {
    clip: ClipToken,
    sink: Sink,
    started: bool,
}

struct AudioWorker {
    handle: OutputStreamHandle,
    http: reqwest::blocking::Client,
    events: UnboundedSender<AudioEvent>,
    volume: f32,
    current: Option<LoadedClip>,
}

impl AudioWorker {
    fn new(
        handle: OutputStreamHandle,
        http: reqwest::blocking::Client,
        events: UnboundedSender<AudioEvent>,
        volume: f32,
    ) -> Self {
        Self {
            handle,
            http,
            events,
            volume,
            current: None,
        }
    }

    fn run(mut self, inbox: mpsc::Receiver<AudioCommand>) {
        loop {
            match inbox.recv_timeout(POLL_INTERVAL) {
                Ok(AudioCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.check_finished();
        }
        self.stop_current();
        debug!("Audio thread stopped");
    }

    fn handle_command(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::Load { clip, url } => {
                self.stop_current();
                match self.open_clip(&url) {
                    Ok(sink) => {
                        debug!(clip = clip.0, %url, "Loaded clip");
                        self.current = Some(LoadedClip {
                            clip,
                            sink,
                            started: false,
                        });
                    }
                    Err(err) => {
                        warn!(clip = clip.0, %url, "Failed to load clip: {err:#}");
                        let _ = self.events.send(AudioEvent::Failed {
                            clip,
                            reason: format!("{err:#}"),
                        });
                    }
                }
            }
            AudioCommand::Play => {
                if let Some(current) = self.current.as_mut() {
                    current.sink.play();
                    current.started = true;
                }
            }
            AudioCommand::Pause => {
                if let Some(current) = &self.current {
                    current.sink.pause();
                }
            }
            AudioCommand::Resume => {
                if let Some(current) = &self.current {
                    current.sink.play();
                }
            }
            AudioCommand::Stop => self.stop_current(),
            AudioCommand::Shutdown => {}
        }
    }

    fn open_clip(&self, url: &str) -> Result<Sink> {
        let bytes = fetch_clip(&self.http, url)?;
        let source = Decoder::new(Cursor::new(bytes)).context("Decoding clip")?;
        let sink = Sink::try_new(&self.handle).context("Creating sink")?;
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(source);
        Ok(sink)
    }

    fn check_finished(&mut self) {
        let finished = self
            .current
            .as_ref()
            .is_some_and(|current| current.started && current.sink.empty());
        if !finished {
            return;
        }
        if let Some(current) = self.current.take() {
            debug!(clip = current.clip.0, "Clip finished");
            let _ = self.events.send(AudioEvent::Finished(current.clip));
        }
    }

    fn stop_current(&mut self) {
        if let Some(current) = self.current.take() {
            current.sink.stop();
        }
    }
}

fn clip_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
        .context("Building clip HTTP client")
}

fn fetch_clip(http: &reqwest::blocking::Client, url: &str) -> Result<Vec<u8>> {
    let bytes = http
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .with_context(|| format!("Fetching {url}"))?
        .bytes()
        .context("Reading clip body")?;
    Ok(bytes.to_vec())
}
