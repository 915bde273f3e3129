//! Listener side: fetch clips from the delivery endpoint and play them
//! back to back with a crossfade.

pub mod engine;
pub mod error;
pub mod handle;
pub mod headless;
#[cfg(feature = "device-playback")]
pub mod rodio_backend;
pub mod source;

pub use engine::{CrossfadeEngine, EngineConfig, EngineState, EngineStatus};
pub use error::{PlaybackError, PlaybackResult};
pub use handle::{AudioBackend, ClipHandle, RAMP_STEP, SharedClipHandle, ramp_in_steps};
pub use headless::{HeadlessBackend, HeadlessClip, wav_duration};
#[cfg(feature = "device-playback")]
pub use rodio_backend::{RodioBackend, RodioClip};
pub use source::{ClipSource, FetchedClip, HttpClipSource};
