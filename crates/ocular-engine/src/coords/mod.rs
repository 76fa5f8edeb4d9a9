//! Geometry and color types shared by views and renderers.
//!
//! World space is right-handed with +Z up. Camera poses use a local frame
//! where +X points right, +Y forward and +Z up.

mod color;
mod pose;
mod shape;

pub use color::Color;
pub use pose::Pose;
pub use shape::Shape;
