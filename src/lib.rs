// Skylapse - Library Entry Point
//
// A daylight-windowed time-lapse daemon: polls webcam sources while the sun
// is up, buckets frames per day, compiles daily videos and optional monthly
// summaries. Single-threaded and blocking by design; one logical thread
// drives the scheduler and is the only mutator of shared state.

pub mod collector;
pub mod config;
pub mod constants;
pub mod daylight;
pub mod error;
pub mod fetch;
pub mod registry;
pub mod scheduler;
pub mod snapshot;
pub mod tools;
pub mod video;

pub use error::{Result, SkylapseError};
