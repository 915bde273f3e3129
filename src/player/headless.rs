//! Headless audio backend.
//!
//! Validates WAV payloads with `hound` and simulates playback with tokio
//! timers, so a session runs end to end without an output device.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use super::error::{PlaybackError, PlaybackResult};
use super::handle::{AudioBackend, ClipHandle, SharedClipHandle};

#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessBackend;

impl HeadlessBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Read the WAV header and return the clip duration.
pub fn wav_duration(bytes: &[u8]) -> PlaybackResult<Duration> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| PlaybackError::PlaybackResource(format!("invalid WAV data: {e}")))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(PlaybackError::PlaybackResource(
            "WAV header has a zero sample rate".to_string(),
        ));
    }
    let frames = reader.duration();
    if frames == 0 {
        return Err(PlaybackError::PlaybackResource(
            "WAV clip has no samples".to_string(),
        ));
    }
    Ok(Duration::from_secs_f64(
        frames as f64 / spec.sample_rate as f64,
    ))
}

#[async_trait]
impl AudioBackend for HeadlessBackend {
    async fn decode(&self, bytes: Bytes) -> PlaybackResult<SharedClipHandle> {
        let duration = wav_duration(&bytes)?;
        debug!(duration_ms = duration.as_millis() as u64, "Headless clip decoded");
        Ok(Arc::new(HeadlessClip::new(duration)))
    }
}

#[derive(Debug)]
struct ClipClock {
    playing_since: Option<Instant>,
    elapsed: Duration,
    volume: f32,
    disposed: bool,
}

/// A clip whose playback is a clock: running while started, frozen while paused.
#[derive(Debug)]
pub struct HeadlessClip {
    duration: Duration,
    clock: Mutex<ClipClock>,
    changed: Notify,
}

impl HeadlessClip {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            clock: Mutex::new(ClipClock {
                playing_since: None,
                elapsed: Duration::ZERO,
                volume: 1.0,
                disposed: false,
            }),
            changed: Notify::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Playback position, capped at the clip duration
    pub fn position(&self) -> Duration {
        let clock = self.clock.lock();
        let running = clock
            .playing_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        (clock.elapsed + running).min(self.duration)
    }

    pub fn is_playing(&self) -> bool {
        self.clock.lock().playing_since.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.clock.lock().disposed
    }

    /// `None` while paused; zero once the end is reached or after disposal.
    fn remaining(&self) -> Option<Duration> {
        let clock = self.clock.lock();
        if clock.disposed {
            return Some(Duration::ZERO);
        }
        clock.playing_since.map(|since| {
            self.duration
                .saturating_sub(clock.elapsed + since.elapsed())
        })
    }
}

#[async_trait]
impl ClipHandle for HeadlessClip {
    fn start(&self) {
        let mut clock = self.clock.lock();
        if clock.disposed || clock.playing_since.is_some() {
            return;
        }
        clock.playing_since = Some(Instant::now());
        drop(clock);
        self.changed.notify_waiters();
    }

    fn pause(&self) {
        let mut clock = self.clock.lock();
        if let Some(since) = clock.playing_since.take() {
            clock.elapsed += since.elapsed();
        }
        drop(clock);
        self.changed.notify_waiters();
    }

    fn set_volume(&self, volume: f32) {
        let mut clock = self.clock.lock();
        if !clock.disposed {
            clock.volume = volume.clamp(0.0, 1.0);
        }
    }

    fn volume(&self) -> f32 {
        self.clock.lock().volume
    }

    fn dispose(&self) {
        let mut clock = self.clock.lock();
        if let Some(since) = clock.playing_since.take() {
            clock.elapsed += since.elapsed();
        }
        clock.disposed = true;
        clock.volume = 0.0;
        drop(clock);
        self.changed.notify_waiters();
    }

    async fn wait_until_end(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register before reading the clock so a start/pause in between is not missed
            notified.as_mut().enable();

            match self.remaining() {
                Some(remaining) if remaining.is_zero() => return,
                Some(remaining) => {
                    tokio::select! {
                        _ = tokio::time::sleep(remaining) => {}
                        _ = &mut notified => {}
                    }
                }
                None => notified.await,
            }
        }
    }
}
