//! ocular engine crate.
//!
//! GPU-resident buffers and textures, camera views and composable renderers
//! for live point-cloud, mesh, image and text visualization, plus the window
//! runtime that drives them.

pub mod coords;
pub mod core;
pub mod device;
pub mod display;
pub mod error;
pub mod gpu;
pub mod input;
pub mod logging;
pub mod mesh;
pub mod render;
pub mod text;
pub mod time;
pub mod view;
pub mod window;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorKind, Result};
