//! Crossfade playback engine
//!
//! One engine drives one listener session through
//! fetch → decode → crossfade → play → wait-for-end → fetch, forever, until
//! paused, failed or shut down.
//!
//! The session lives inside a single actor task. User commands and the results
//! of background work (fetches, crossfade ramps, end-of-clip watchers) arrive
//! as messages, so every state mutation happens in one place. Background work
//! is tagged with the epoch it was started in and the clip it concerns; results
//! from an abandoned epoch or a replaced clip are discarded without touching
//! the session.
//!
//! ```text
//!   Idle ──play──▶ Fetching ──clip──▶ Swapping ──ramps done──▶ Playing
//!                   ▲   │ duplicate                               │ │
//!                   │   └──(bounded)                      clip end │ │ pause
//!                   └──────────────────────────────────────────────┘ ▼
//!                                                               Paused
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::join;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{PlaybackError, PlaybackResult};
use super::handle::{AudioBackend, SharedClipHandle};
use super::source::ClipSource;
use crate::core::SlotIndex;

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Length of the inverse volume ramps between consecutive clips
    pub crossfade: Duration,
    /// Consecutive duplicate deliveries tolerated within one fetch
    pub max_duplicate_retries: u32,
    /// Consecutive undecodable clips tolerated before giving up
    pub max_decode_failures: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            crossfade: Duration::from_millis(1000),
            max_duplicate_retries: 3,
            max_decode_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Fetching,
    Swapping,
    Playing,
    Paused,
}

/// Listener-facing snapshot of the session
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub state: EngineState,
    /// Whether the listener wants audio (the play/pause indicator)
    pub playing: bool,
    pub last_slot: Option<SlotIndex>,
    pub last_error: Option<PlaybackError>,
    /// Clips that became the current clip
    pub clips_played: u64,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            state: EngineState::Idle,
            playing: false,
            last_slot: None,
            last_error: None,
            clips_played: 0,
        }
    }
}

#[derive(Debug)]
enum Command {
    Play,
    Pause,
    Toggle,
}

enum FetchOutcome {
    Ready {
        index: SlotIndex,
        handle: SharedClipHandle,
    },
    DecodeFailed {
        index: SlotIndex,
        error: PlaybackError,
    },
    Failed(PlaybackError),
}

enum EngineEvent {
    Fetched { epoch: u64, outcome: FetchOutcome },
    Swapped { epoch: u64, clip_id: u64 },
    ClipEnded { clip_id: u64 },
}

struct ActiveClip {
    id: u64,
    handle: SharedClipHandle,
    ended: bool,
}

/// Handle to a running playback session.
///
/// Dropping the engine tears the session down; [`CrossfadeEngine::shutdown`]
/// does the same and waits for it to finish.
pub struct CrossfadeEngine {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<EngineStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CrossfadeEngine {
    /// Start a session in `Idle`. Must be called within a tokio runtime.
    pub fn spawn(
        source: Arc<dyn ClipSource>,
        backend: Arc<dyn AudioBackend>,
        config: EngineConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(EngineStatus::default());
        let cancel = CancellationToken::new();

        let session = Session {
            source,
            backend,
            config,
            events: events_tx,
            status: status_tx,
            state: EngineState::Idle,
            wants_playing: false,
            current: None,
            incoming: None,
            last_slot: None,
            last_error: None,
            clips_played: 0,
            epoch: 0,
            next_clip_id: 0,
            decode_failures: 0,
            fetch_task: None,
            swap_task: None,
            end_watch: None,
        };

        let task = tokio::spawn(run_session(session, commands_rx, events_rx, cancel.clone()));

        Self {
            commands: commands_tx,
            status: status_rx,
            cancel,
            task: Some(task),
        }
    }

    pub fn play(&self) -> PlaybackResult<()> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> PlaybackResult<()> {
        self.send(Command::Pause)
    }

    pub fn toggle(&self) -> PlaybackResult<()> {
        self.send(Command::Toggle)
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every published status
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Tear the session down and wait until every handle is disposed
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Playback session task ended abnormally: {}", e);
            }
        }
    }

    fn send(&self, command: Command) -> PlaybackResult<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::SessionClosed)
    }
}

impl Drop for CrossfadeEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_session(
    mut session: Session,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => session.handle_command(command),
                None => break,
            },
            Some(event) = events.recv() => session.handle_event(event),
        }
        session.publish();
    }

    session.teardown();
    session.publish();
    // Late results still queued hold decoded handles; release them unplayed.
    events.close();
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::Fetched {
            outcome: FetchOutcome::Ready { handle, .. },
            ..
        } = event
        {
            handle.dispose();
        }
    }
}

struct Session {
    source: Arc<dyn ClipSource>,
    backend: Arc<dyn AudioBackend>,
    config: EngineConfig,
    events: mpsc::UnboundedSender<EngineEvent>,
    status: watch::Sender<EngineStatus>,

    state: EngineState,
    wants_playing: bool,
    current: Option<ActiveClip>,
    incoming: Option<ActiveClip>,
    last_slot: Option<SlotIndex>,
    last_error: Option<PlaybackError>,
    clips_played: u64,
    /// Bumped whenever outstanding background work must be ignored
    epoch: u64,
    next_clip_id: u64,
    decode_failures: u32,

    fetch_task: Option<AbortHandle>,
    swap_task: Option<AbortHandle>,
    end_watch: Option<AbortHandle>,
}

impl Session {
    fn handle_command(&mut self, command: Command) {
        debug!(?command, state = ?self.state, "Playback command");
        match command {
            Command::Play => self.play(),
            Command::Pause => self.pause(),
            Command::Toggle if self.wants_playing => self.pause(),
            Command::Toggle => self.play(),
        }
    }

    fn play(&mut self) {
        if self.wants_playing {
            return;
        }
        self.wants_playing = true;
        self.last_error = None;

        match self.state {
            EngineState::Idle => self.begin_fetch(),
            EngineState::Paused => match &self.current {
                Some(current) if !current.ended => {
                    current.handle.start();
                    self.transition(EngineState::Playing);
                }
                _ => self.begin_fetch(),
            },
            EngineState::Swapping => {
                for clip in self.current.iter().chain(self.incoming.iter()) {
                    clip.handle.start();
                }
            }
            // The fetch in flight installs its clip audibly
            EngineState::Fetching | EngineState::Playing => {}
        }
    }

    fn pause(&mut self) {
        if !self.wants_playing {
            return;
        }
        self.wants_playing = false;

        match self.state {
            EngineState::Playing => {
                if let Some(current) = &self.current {
                    current.handle.pause();
                }
                self.transition(EngineState::Paused);
            }
            EngineState::Swapping => {
                for clip in self.current.iter().chain(self.incoming.iter()) {
                    clip.handle.pause();
                }
            }
            // Keep the fetch; its clip is installed paused
            EngineState::Fetching | EngineState::Idle | EngineState::Paused => {}
        }
    }

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Fetched { epoch, outcome } => {
                if epoch != self.epoch || self.state != EngineState::Fetching {
                    debug!(epoch, current_epoch = self.epoch, "Discarding stale fetch result");
                    if let FetchOutcome::Ready { handle, .. } = outcome {
                        handle.dispose();
                    }
                    return;
                }
                self.fetch_task = None;
                self.on_fetched(outcome);
            }
            EngineEvent::Swapped { epoch, clip_id } => {
                let expected = self.incoming.as_ref().map(|c| c.id);
                if epoch == self.epoch && expected == Some(clip_id) {
                    self.swap_task = None;
                    self.finish_swap();
                }
            }
            EngineEvent::ClipEnded { clip_id } => self.on_clip_ended(clip_id),
        }
    }

    fn on_fetched(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Ready { index, handle } => {
                self.last_slot = Some(index);
                self.decode_failures = 0;
                self.install(index, handle);
            }
            FetchOutcome::DecodeFailed { index, error } => {
                self.decode_failures += 1;
                warn!(
                    slot = %index,
                    failures = self.decode_failures,
                    "Discarding undecodable clip: {}",
                    error
                );
                if self.decode_failures >= self.config.max_decode_failures {
                    self.fail(error);
                } else {
                    // `last_slot` stays the slot the listener heard
                    self.fetch_avoiding(Some(index));
                }
            }
            FetchOutcome::Failed(error) => self.fail(error),
        }
    }

    fn install(&mut self, index: SlotIndex, handle: SharedClipHandle) {
        let clip = ActiveClip {
            id: self.next_clip_id,
            handle,
            ended: false,
        };
        self.next_clip_id += 1;
        self.clips_played += 1;

        match self.current.take() {
            None => {
                clip.handle.set_volume(1.0);
                self.make_current(clip);
                info!(slot = %index, "Playing first clip");
            }
            Some(outgoing) if !self.wants_playing => {
                // Nothing is audible, so replace without a fade
                self.stop_end_watch();
                outgoing.handle.dispose();
                clip.handle.set_volume(1.0);
                self.make_current(clip);
                debug!(slot = %index, "Replaced clip while paused");
            }
            Some(outgoing) => {
                self.current = Some(outgoing);
                self.begin_swap(index, clip);
            }
        }
    }

    fn make_current(&mut self, clip: ActiveClip) {
        if self.wants_playing {
            clip.handle.start();
        }
        self.watch_end(&clip);
        self.current = Some(clip);
        self.transition(if self.wants_playing {
            EngineState::Playing
        } else {
            EngineState::Paused
        });
    }

    fn begin_swap(&mut self, index: SlotIndex, clip: ActiveClip) {
        let Some(outgoing) = self.current.as_ref().map(|c| Arc::clone(&c.handle)) else {
            return;
        };
        let incoming = Arc::clone(&clip.handle);
        incoming.set_volume(0.0);
        incoming.start();

        let events = self.events.clone();
        let epoch = self.epoch;
        let clip_id = clip.id;
        let duration = self.config.crossfade;
        let task = tokio::spawn(async move {
            join(
                outgoing.ramp_volume(1.0, 0.0, duration),
                incoming.ramp_volume(0.0, 1.0, duration),
            )
            .await;
            let _ = events.send(EngineEvent::Swapped { epoch, clip_id });
        });

        self.swap_task = Some(task.abort_handle());
        self.incoming = Some(clip);
        self.transition(EngineState::Swapping);
        debug!(slot = %index, crossfade_ms = duration.as_millis() as u64, "Crossfading");
    }

    /// Both ramps are done: retire the outgoing clip exactly once.
    fn finish_swap(&mut self) {
        let Some(incoming) = self.incoming.take() else {
            return;
        };
        self.stop_end_watch();
        if let Some(outgoing) = self.current.take() {
            outgoing.handle.dispose();
        }
        incoming.handle.set_volume(1.0);
        self.watch_end(&incoming);
        self.current = Some(incoming);
        self.transition(if self.wants_playing {
            EngineState::Playing
        } else {
            EngineState::Paused
        });
    }

    fn on_clip_ended(&mut self, clip_id: u64) {
        let Some(current) = self.current.as_mut().filter(|c| c.id == clip_id) else {
            return;
        };
        current.ended = true;
        self.end_watch = None;

        if self.state == EngineState::Playing {
            debug!(clip_id, "Clip finished, fetching next");
            self.begin_fetch();
        }
    }

    fn begin_fetch(&mut self) {
        self.fetch_avoiding(None);
    }

    /// Start a fetch that asks the server to skip `avoid` instead of the last
    /// slot heard. Duplicates are still judged against the last slot heard.
    fn fetch_avoiding(&mut self, avoid: Option<SlotIndex>) {
        self.epoch += 1;
        let epoch = self.epoch;
        let source = Arc::clone(&self.source);
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let heard = self.last_slot;
        let exclude = avoid.or(heard);
        let max_duplicates = self.config.max_duplicate_retries;

        let task = tokio::spawn(async move {
            let outcome =
                fetch_next(source.as_ref(), backend.as_ref(), heard, exclude, max_duplicates).await;
            let _ = events.send(EngineEvent::Fetched { epoch, outcome });
        });
        if let Some(previous) = self.fetch_task.replace(task.abort_handle()) {
            previous.abort();
        }
        self.transition(EngineState::Fetching);
    }

    fn watch_end(&mut self, clip: &ActiveClip) {
        let handle = Arc::clone(&clip.handle);
        let events = self.events.clone();
        let clip_id = clip.id;
        let task = tokio::spawn(async move {
            handle.wait_until_end().await;
            let _ = events.send(EngineEvent::ClipEnded { clip_id });
        });
        if let Some(previous) = self.end_watch.replace(task.abort_handle()) {
            previous.abort();
        }
    }

    fn stop_end_watch(&mut self) {
        if let Some(watch) = self.end_watch.take() {
            watch.abort();
        }
    }

    fn abort_background(&mut self) {
        self.epoch += 1;
        for task in [
            self.fetch_task.take(),
            self.swap_task.take(),
            self.end_watch.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }

    fn release_handles(&mut self) {
        for clip in [self.current.take(), self.incoming.take()]
            .into_iter()
            .flatten()
        {
            clip.handle.dispose();
        }
    }

    /// Stop cleanly and report; a new `play` starts over.
    fn fail(&mut self, error: PlaybackError) {
        warn!(state = ?self.state, "Playback stopped: {}", error);
        self.abort_background();
        self.release_handles();
        self.wants_playing = false;
        self.decode_failures = 0;
        self.last_error = Some(error);
        self.transition(EngineState::Idle);
    }

    fn teardown(&mut self) {
        self.abort_background();
        self.release_handles();
        self.wants_playing = false;
        self.transition(EngineState::Idle);
        info!(clips_played = self.clips_played, "Playback session closed");
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Playback state change");
            self.state = next;
        }
    }

    fn publish(&self) {
        let status = EngineStatus {
            state: self.state,
            playing: self.wants_playing,
            last_slot: self.last_slot,
            last_error: self.last_error.clone(),
            clips_played: self.clips_played,
        };
        self.status.send_if_modified(|published| {
            if *published == status {
                false
            } else {
                *published = status;
                true
            }
        });
    }
}

/// Fetch until a clip other than `heard` arrives, then decode it.
///
/// `exclude` is what the server is asked to skip. Duplicates of `heard` are
/// retried at most `max_duplicates` times in total.
async fn fetch_next(
    source: &dyn ClipSource,
    backend: &dyn AudioBackend,
    heard: Option<SlotIndex>,
    exclude: Option<SlotIndex>,
    max_duplicates: u32,
) -> FetchOutcome {
    let mut attempts = 0;
    let clip = loop {
        attempts += 1;
        let clip = match source.fetch(exclude).await {
            Ok(clip) => clip,
            Err(error) => return FetchOutcome::Failed(error),
        };
        if Some(clip.index) != heard {
            break clip;
        }
        warn!(slot = %clip.index, attempts, "Server repeated the previous clip");
        if attempts >= max_duplicates {
            return FetchOutcome::Failed(PlaybackError::DuplicateClip {
                slot: clip.index,
                attempts,
            });
        }
    };

    match backend.decode(clip.bytes).await {
        Ok(handle) => FetchOutcome::Ready {
            index: clip.index,
            handle,
        },
        Err(error) => FetchOutcome::DecodeFailed {
            index: clip.index,
            error,
        },
    }
}
