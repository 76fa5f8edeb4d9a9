use thiserror::Error;

/// Result type used throughout the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad class of an [`Error`].
///
/// Configuration errors are caller mistakes and never retried. Resource-state
/// errors abort the current operation only. External errors come from the
/// platform, driver or codecs.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    Configuration,
    ResourceState,
    External,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported channel count {0} (expected 1 to 4)")]
    InvalidChannelCount(u32),

    #[error("unsupported bit depth {0} (expected 8, 16 or 32)")]
    InvalidBitDepth(u32),

    #[error("{what}: expected {expected} elements, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("vertex count {0} is not a multiple of 3")]
    NotTriangleList(usize),

    #[error("invalid font: {0}")]
    InvalidFont(String),

    #[error("buffer is already mapped")]
    AlreadyMapped,

    #[error("buffer is mapped and cannot be used by the GPU")]
    BufferMapped,

    #[error("incomplete render attachment: {0}")]
    IncompleteAttachment(String),

    #[error("buffer mapping failed: {0}")]
    MapFailed(String),

    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(String),

    #[error("surface is not supported by the adapter")]
    UnsupportedSurface,

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidChannelCount(_)
            | Error::InvalidBitDepth(_)
            | Error::SizeMismatch { .. }
            | Error::NotTriangleList(_)
            | Error::InvalidFont(_) => ErrorKind::Configuration,

            Error::AlreadyMapped
            | Error::BufferMapped
            | Error::IncompleteAttachment(_)
            | Error::MapFailed(_) => ErrorKind::ResourceState,

            Error::NoAdapter(_)
            | Error::UnsupportedSurface
            | Error::RequestDevice(_)
            | Error::CreateSurface(_)
            | Error::Surface(_)
            | Error::Poll(_)
            | Error::Image(_) => ErrorKind::External,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(Error::InvalidChannelCount(5).kind(), ErrorKind::Configuration);
        assert_eq!(Error::NotTriangleList(4).kind(), ErrorKind::Configuration);
        assert_eq!(Error::AlreadyMapped.kind(), ErrorKind::ResourceState);
        assert_eq!(
            Error::IncompleteAttachment("zero size".into()).kind(),
            ErrorKind::ResourceState
        );
        assert_eq!(Error::UnsupportedSurface.kind(), ErrorKind::External);
    }

    #[test]
    fn size_mismatch_message_names_both_counts() {
        let err = Error::SizeMismatch { what: "normals", expected: 3, actual: 2 };
        assert_eq!(err.to_string(), "normals: expected 3 elements, got 2");
    }
}
