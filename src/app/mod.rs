//! Terminal front end and the single-threaded event loop.
//!
//! Ingestion, status tracking, audio completion, typed commands and Ctrl-C
//! all arrive as channel messages and are handled one at a time against the
//! [`ReaderSession`].

mod input;
mod render;

use crate::audio::RodioOutput;
use crate::cache::FileStore;
use crate::config::AppConfig;
use anyhow::{Context, Result};
use glowtalk_core::feed::{ingest, open_feed};
use glowtalk_core::status::{
    GenerationStatus, StatusTracker, fetch_status, subscribe_status,
};
use glowtalk_core::{
    AudioLocator, CancellationToken, ContentFragment, FeedError, IngestOutcome, ReaderSession,
    SessionCommand, ViewUpdate, WorkId,
};
use input::{Input, KeyMap};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

/// What the player was asked to open.
#[derive(Debug, Clone, Copy)]
pub struct LaunchOptions {
    pub work: WorkId,
    pub total_units: Option<usize>,
}

enum FeedMessage {
    Fragment(ContentFragment),
    Finished(Result<IngestOutcome, FeedError>),
}

type Session = ReaderSession<RodioOutput, FileStore>;

pub fn run_app(config: AppConfig, options: LaunchOptions) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Building async runtime")?;
    runtime.block_on(run_session(config, options))
}

async fn run_session(config: AppConfig, options: LaunchOptions) -> Result<()> {
    let client = reqwest::Client::builder()
        .build()
        .context("Building HTTP client")?;
    let store = FileStore::open(Path::new(&config.cache_dir), &config.server_url);
    info!(path = %store.path().display(), "Using preference store");
    let (audio_tx, mut audio_rx) = mpsc::unbounded_channel();
    let output = RodioOutput::spawn(
        AudioLocator::new(config.server_url.clone()),
        audio_tx,
        config.volume,
    )?;

    let mut session: Session = ReaderSession::new(options.work, output, store);
    session.set_total_units(options.total_units);

    let (feed_tx, mut feed_rx) = mpsc::unbounded_channel();
    tokio::spawn(stream_feed(
        client.clone(),
        config.content_url(options.work),
        session.cancel_token(),
        feed_tx,
    ));

    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    spawn_status_watch(&config, client, session.cancel_token(), status_tx);

    let (quit_tx, mut quit_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = quit_tx.send(());
    })
    .context("Installing Ctrl-C handler")?;

    let keys = KeyMap::from_config(&config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut feed_open = true;
    let mut autoplay_pending = config.autoplay;
    let mut tracker = StatusTracker::new();
    println!("{}", keys.help());

    loop {
        tokio::select! {
            message = feed_rx.recv(), if feed_open => match message {
                Some(FeedMessage::Fragment(fragment)) => {
                    let update = session.on_fragment(&fragment);
                    println!("{}", render::fragment(session.tree(), &fragment));
                    print_update(&session, &update);
                    if autoplay_pending && session.tree().playable_count() > 0 {
                        autoplay_pending = false;
                        dispatch(&mut session, SessionCommand::ResumeFromSaved);
                    }
                }
                Some(FeedMessage::Finished(result)) => {
                    session.on_ingest_end(&result);
                    println!("{}", render::snapshot(&session.snapshot()));
                    feed_open = false;
                }
                None => feed_open = false,
            },
            Some(event) = audio_rx.recv() => {
                let update = session.on_audio_event(event);
                print_update(&session, &update);
            }
            Some(status) = status_rx.recv() => {
                let change = tracker.observe(status, Instant::now());
                if change.new_clips || change.total_changed {
                    info!(
                        completed = change.status.completed,
                        remaining = change.status.remaining(),
                        "Generation progress"
                    );
                    println!("{}", render::status(&change));
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => if let Some(input) = keys.parse(&line) {
                    match input {
                        Input::Command(command) => dispatch(&mut session, command),
                        Input::PlaySequence(sequence) => match session.tree().unit_by_sequence(sequence) {
                            Some(unit) => dispatch(&mut session, SessionCommand::PlayUnit { node: unit.node }),
                            None => println!("Clip #{sequence} has not arrived yet"),
                        },
                        Input::Status => {
                            println!("{}", render::snapshot(&session.snapshot()));
                            if let Some(status) = tracker.last() {
                                println!(
                                    "generation: {} done, {} remaining",
                                    status.completed,
                                    status.remaining()
                                );
                            }
                        }
                        Input::Help => println!("{}", keys.help()),
                        Input::Quit => break,
                        Input::Unknown(key) => println!("Unknown command `{key}`; {}", keys.help()),
                    }
                }
                Ok(None) => {
                    debug!("Standard input closed; keyboard commands disabled");
                    stdin_open = false;
                }
                Err(err) => {
                    warn!("Failed to read command: {err}");
                    stdin_open = false;
                }
            },
            _ = quit_rx.recv() => {
                info!("Interrupted");
                break;
            }
        }
    }

    let update = session.close();
    print_update(&session, &update);
    info!(work = %options.work, "Player stopped");
    Ok(())
}

fn dispatch(session: &mut Session, command: SessionCommand) {
    let event = session.apply_command(command);
    debug!(action = event.action, state = ?event.snapshot.state, "Applied command");
    let lines = render::update(session.tree(), &event.update);
    if lines.is_empty() {
        println!("{}", render::snapshot(&event.snapshot));
    }
    for line in lines {
        println!("{line}");
    }
}

fn print_update(session: &Session, update: &ViewUpdate) {
    for line in render::update(session.tree(), update) {
        println!("{line}");
    }
}

async fn stream_feed(
    client: reqwest::Client,
    url: String,
    cancel: CancellationToken,
    tx: UnboundedSender<FeedMessage>,
) {
    let result = match open_feed(&client, &url, cancel).await {
        Ok(mut reader) => {
            ingest(&mut reader, |fragment| {
                let _ = tx.send(FeedMessage::Fragment(fragment));
            })
            .await
        }
        Err(err) => Err(err),
    };
    let _ = tx.send(FeedMessage::Finished(result));
}

fn spawn_status_watch(
    config: &AppConfig,
    client: reqwest::Client,
    cancel: CancellationToken,
    tx: UnboundedSender<GenerationStatus>,
) {
    if let Some(url) = config.status_events_url() {
        tokio::spawn(follow_status(client, url, cancel, tx));
    } else if config.status_poll_secs > 0 {
        let every = Duration::from_secs(config.status_poll_secs);
        tokio::spawn(poll_status(client, config.status_url(), every, cancel, tx));
    } else {
        debug!("Generation status tracking disabled");
    }
}

async fn poll_status(
    client: reqwest::Client,
    url: String,
    every: Duration,
    cancel: CancellationToken,
    tx: UnboundedSender<GenerationStatus>,
) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match fetch_status(&client, &url).await {
            Ok(status) => {
                if tx.send(status).is_err() {
                    break;
                }
            }
            Err(err) => debug!(%url, "Queue status unavailable: {err}"),
        }
    }
}

async fn follow_status(
    client: reqwest::Client,
    url: String,
    cancel: CancellationToken,
    tx: UnboundedSender<GenerationStatus>,
) {
    let mut subscription = match subscribe_status(&client, &url, cancel).await {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!(%url, "Generation status stream unavailable: {err}");
            return;
        }
    };
    loop {
        match subscription.next_status().await {
            Ok(Some(status)) => {
                if tx.send(status).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%url, "Generation status stream failed: {err}");
                break;
            }
        }
    }
}
