//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue shared by all displays
//! - owning the shader cache tied to that device
//! - creating & configuring per-window surfaces and acquiring their frames

mod context;
mod frame;
mod init;
mod shader_cache;
mod surface;

pub use context::{GpuContext, SharedContext};
pub use frame::SurfaceFrame;
pub use init::GpuInit;
pub use shader_cache::{PipelineKey, ShaderCache};
pub use surface::{DisplaySurface, SurfaceErrorAction};
