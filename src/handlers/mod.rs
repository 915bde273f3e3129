//! HTTP request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Health check endpoint
//! - `clip` - Clip delivery (`/lofi`)
//! - `generate` - Cache warm-up trigger (`/generate-lofi`)
//! - `slots` - Prompt catalog listing

pub mod api;
pub mod clip;
pub mod generate;
pub mod slots;

// Re-export commonly used handlers for convenient access
pub use clip::deliver_clip;
pub use generate::generate_clip;
