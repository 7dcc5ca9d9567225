//! Utility Module
//!
//! - [`time`]: Tick-driven frame clock

pub mod time;

pub use time::FrameClock;
