//! Frame timing.
//!
//! One [`FrameClock`] per window yields the per-frame [`FrameTime`]. Displays
//! use [`FrameCounter`] for the optional frames-per-second report and
//! [`FrameLimiter`] for an optional frame rate cap.

mod frame_clock;
mod frame_counter;

pub use frame_clock::{FrameClock, FrameTime};
pub use frame_counter::{FrameCounter, FrameLimiter};
