//! GPU-resident data: typed vectors, textures and pixel formats.
//!
//! Vectors and textures allocate lazily, keep their storage when the size
//! does not grow and track mapping state so that host access, external
//! compute access and drawing never overlap.

mod format;
mod image;
mod mapping;
mod texture;
mod vector;

pub use format::{BitDepth, ChannelStorage, PixelFormat, StorageFormat, Texel};
pub use image::DecodedImage;
pub use mapping::{ExternalMapping, HostMapping};
pub use texture::{GpuTexture, TextureBinding};
pub use vector::GpuVector;

pub(crate) use mapping::MapState;
pub(crate) use vector::{copy_aligned, VECTOR_USAGES};
