//! Decoded, playable clips and the backends that produce them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::MissedTickBehavior;

use super::error::PlaybackResult;

/// Interval between volume updates during a ramp
pub const RAMP_STEP: Duration = Duration::from_millis(20);

/// A decoded clip owned by exactly one playback session.
///
/// Handles start paused at full volume. After `dispose` every other call is a
/// no-op and the handle holds no audio resources.
#[async_trait]
pub trait ClipHandle: Send + Sync {
    /// Begin or resume playback
    fn start(&self);

    /// Pause without releasing resources
    fn pause(&self);

    fn set_volume(&self, volume: f32);

    fn volume(&self) -> f32;

    /// Move the volume from `from` to `to` over `duration`.
    ///
    /// Resolves exactly when the target volume has been applied.
    async fn ramp_volume(&self, from: f32, to: f32, duration: Duration) {
        ramp_in_steps(self, from, to, duration).await;
    }

    /// Release the underlying audio resources
    fn dispose(&self);

    /// Resolves once playback reaches the end of the clip, or immediately once
    /// the handle has been disposed.
    async fn wait_until_end(&self);
}

pub type SharedClipHandle = Arc<dyn ClipHandle>;

/// Turns delivered bytes into playable handles
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn decode(&self, bytes: Bytes) -> PlaybackResult<SharedClipHandle>;
}

/// Linear volume ramp driven by a tokio interval.
pub async fn ramp_in_steps<H>(handle: &H, from: f32, to: f32, duration: Duration)
where
    H: ClipHandle + ?Sized,
{
    if duration.is_zero() {
        handle.set_volume(to);
        return;
    }

    let steps = (duration.as_millis() / RAMP_STEP.as_millis()).max(1) as u32;
    let mut ticker = tokio::time::interval(duration / steps);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    handle.set_volume(from);
    // First tick completes immediately
    ticker.tick().await;
    for step in 1..steps {
        ticker.tick().await;
        let progress = step as f32 / steps as f32;
        handle.set_volume(from + (to - from) * progress);
    }
    ticker.tick().await;
    handle.set_volume(to);
}
