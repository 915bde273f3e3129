//! Device playback through `rodio`.
//!
//! Each clip gets its own `Sink` on the shared output stream, so two clips can
//! overlap during a crossfade and each volume is set independently.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, info, warn};

use super::error::{PlaybackError, PlaybackResult};
use super::handle::{AudioBackend, ClipHandle, SharedClipHandle};

pub struct RodioBackend {
    handle: OutputStreamHandle,
}

impl RodioBackend {
    /// Open the default output device.
    ///
    /// The returned `OutputStream` must stay alive for as long as clips play.
    pub fn try_default() -> PlaybackResult<(OutputStream, Self)> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| PlaybackError::PlaybackResource(format!("no output device: {e}")))?;
        info!("Audio playback initialized on default output device");
        Ok((stream, Self { handle }))
    }
}

#[async_trait]
impl AudioBackend for RodioBackend {
    async fn decode(&self, bytes: Bytes) -> PlaybackResult<SharedClipHandle> {
        let decoder = Decoder::new(Cursor::new(bytes))
            .map_err(|e| PlaybackError::PlaybackResource(format!("cannot decode clip: {e}")))?;
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| PlaybackError::PlaybackResource(e.to_string()))?;
        sink.pause();
        sink.append(decoder);

        debug!("Clip decoded onto a paused sink");
        Ok(Arc::new(RodioClip {
            sink: Arc::new(sink),
            disposed: AtomicBool::new(false),
        }))
    }
}

pub struct RodioClip {
    sink: Arc<Sink>,
    disposed: AtomicBool,
}

#[async_trait]
impl ClipHandle for RodioClip {
    fn start(&self) {
        if !self.disposed.load(Ordering::SeqCst) {
            self.sink.play();
        }
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn set_volume(&self, volume: f32) {
        if !self.disposed.load(Ordering::SeqCst) {
            self.sink.set_volume(volume.clamp(0.0, 1.0));
        }
    }

    fn volume(&self) -> f32 {
        self.sink.volume()
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the queued source wakes any sleep_until_end
        self.sink.stop();
    }

    async fn wait_until_end(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let sink = Arc::clone(&self.sink);
        if let Err(e) = tokio::task::spawn_blocking(move || sink.sleep_until_end()).await {
            warn!("Clip end watcher failed: {}", e);
        }
    }
}
