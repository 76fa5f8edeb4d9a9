use std::borrow::Cow;

use bytemuck::Pod;
use half::f16;

use crate::error::{Error, Result};

/// Per-channel storage of host pixel data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BitDepth {
    /// 8-bit unsigned normalized.
    U8,
    /// 16-bit unsigned normalized.
    U16,
    /// 32-bit float.
    F32,
}

impl BitDepth {
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(BitDepth::U8),
            16 => Ok(BitDepth::U16),
            32 => Ok(BitDepth::F32),
            other => Err(Error::InvalidBitDepth(other)),
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    pub fn bytes(self) -> usize {
        match self {
            BitDepth::U8 => 1,
            BitDepth::U16 => 2,
            BitDepth::F32 => 4,
        }
    }
}

/// Layout of host pixel data: channel count and bit depth.
///
/// GPU storage is chosen per device by [`PixelFormat::storage`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PixelFormat {
    channels: u32,
    depth: BitDepth,
}

impl PixelFormat {
    /// Fails with [`Error::InvalidChannelCount`] or [`Error::InvalidBitDepth`].
    pub fn new(channels: u32, bit_depth: u32) -> Result<Self> {
        Self::with_depth(channels, BitDepth::from_bits(bit_depth)?)
    }

    pub fn with_depth(channels: u32, depth: BitDepth) -> Result<Self> {
        if !(1..=4).contains(&channels) {
            return Err(Error::InvalidChannelCount(channels));
        }
        Ok(Self { channels, depth })
    }

    pub const RGBA8: PixelFormat = PixelFormat {
        channels: 4,
        depth: BitDepth::U8,
    };

    pub fn channels(self) -> u32 {
        self.channels
    }

    pub fn depth(self) -> BitDepth {
        self.depth
    }

    /// Bytes per pixel of host data in this format.
    pub fn bytes_per_pixel(self) -> usize {
        self.channels as usize * self.depth.bytes()
    }

    /// Storage for this format on a device with `features`.
    ///
    /// 8-bit data keeps its width. 16-bit data is stored as 16-bit unorm
    /// when the device has `TEXTURE_FORMAT_16BIT_NORM`, float data as 32-bit
    /// float when it has `FLOAT32_FILTERABLE`. Without those features both
    /// fall back to half floats, which lose precision above 11 bits.
    /// Three-channel data gains an opaque alpha channel, since wgpu has no
    /// RGB formats.
    pub fn storage(self, features: wgpu::Features) -> StorageFormat {
        let channel = match self.depth {
            BitDepth::U8 => ChannelStorage::Unorm8,
            BitDepth::U16 if features.contains(wgpu::Features::TEXTURE_FORMAT_16BIT_NORM) => {
                ChannelStorage::Unorm16
            }
            BitDepth::F32 if features.contains(wgpu::Features::FLOAT32_FILTERABLE) => ChannelStorage::Float32,
            BitDepth::U16 | BitDepth::F32 => ChannelStorage::Half,
        };
        StorageFormat { pixel: self, channel }
    }
}

/// How each channel is stored on the GPU.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ChannelStorage {
    Unorm8,
    Unorm16,
    /// Fallback for 16-bit and float data.
    Half,
    Float32,
}

impl ChannelStorage {
    fn bytes(self) -> usize {
        match self {
            ChannelStorage::Unorm8 => 1,
            ChannelStorage::Unorm16 | ChannelStorage::Half => 2,
            ChannelStorage::Float32 => 4,
        }
    }
}

/// GPU storage chosen for a [`PixelFormat`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StorageFormat {
    pixel: PixelFormat,
    channel: ChannelStorage,
}

impl StorageFormat {
    pub fn pixel(self) -> PixelFormat {
        self.pixel
    }

    pub fn channel(self) -> ChannelStorage {
        self.channel
    }

    pub fn texture_format(self) -> wgpu::TextureFormat {
        use wgpu::TextureFormat as F;
        use ChannelStorage as C;
        match (self.channel, self.pixel.channels) {
            (C::Unorm8, 1) => F::R8Unorm,
            (C::Unorm8, 2) => F::Rg8Unorm,
            (C::Unorm8, _) => F::Rgba8Unorm,
            (C::Unorm16, 1) => F::R16Unorm,
            (C::Unorm16, 2) => F::Rg16Unorm,
            (C::Unorm16, _) => F::Rgba16Unorm,
            (C::Half, 1) => F::R16Float,
            (C::Half, 2) => F::Rg16Float,
            (C::Half, _) => F::Rgba16Float,
            (C::Float32, 1) => F::R32Float,
            (C::Float32, 2) => F::Rg32Float,
            (C::Float32, _) => F::Rgba32Float,
        }
    }

    fn channels(self) -> usize {
        if self.pixel.channels == 3 { 4 } else { self.pixel.channels as usize }
    }

    /// Bytes per pixel of GPU storage.
    pub fn bytes_per_pixel(self) -> usize {
        self.channels() * self.channel.bytes()
    }

    /// True when host bytes can be copied to storage unchanged.
    pub fn is_host_layout(self) -> bool {
        if self.pixel.channels == 3 {
            return false;
        }
        match self.channel {
            ChannelStorage::Unorm8 => true,
            ChannelStorage::Unorm16 | ChannelStorage::Float32 => cfg!(target_endian = "little"),
            ChannelStorage::Half => false,
        }
    }

    /// Converts tightly packed host pixels into the storage layout.
    pub(crate) fn convert<'a>(self, src: &'a [u8]) -> Cow<'a, [u8]> {
        if self.is_host_layout() {
            return Cow::Borrowed(src);
        }

        let host_bpp = self.pixel.bytes_per_pixel();
        let channel_bytes = self.pixel.depth.bytes();
        let mut out = Vec::with_capacity(src.len() / host_bpp * self.bytes_per_pixel());

        for pixel in src.chunks_exact(host_bpp) {
            for channel in pixel.chunks_exact(channel_bytes) {
                push_channel(&mut out, self.channel, channel);
            }
            if self.pixel.channels == 3 {
                push_opaque_alpha(&mut out, self.channel);
            }
        }

        Cow::Owned(out)
    }
}

fn push_channel(out: &mut Vec<u8>, storage: ChannelStorage, channel: &[u8]) {
    match (storage, channel.len()) {
        (ChannelStorage::Unorm8, _) => out.push(channel[0]),
        (ChannelStorage::Unorm16, _) => {
            let v = u16::from_ne_bytes([channel[0], channel[1]]);
            out.extend_from_slice(&v.to_le_bytes());
        }
        (ChannelStorage::Float32, _) => {
            let v = f32::from_ne_bytes([channel[0], channel[1], channel[2], channel[3]]);
            out.extend_from_slice(&v.to_le_bytes());
        }
        (ChannelStorage::Half, 2) => {
            let v = u16::from_ne_bytes([channel[0], channel[1]]);
            let h = f16::from_f32(v as f32 / u16::MAX as f32);
            out.extend_from_slice(&h.to_bits().to_le_bytes());
        }
        (ChannelStorage::Half, _) => {
            let v = f32::from_ne_bytes([channel[0], channel[1], channel[2], channel[3]]);
            out.extend_from_slice(&f16::from_f32(v).to_bits().to_le_bytes());
        }
    }
}

fn push_opaque_alpha(out: &mut Vec<u8>, storage: ChannelStorage) {
    match storage {
        ChannelStorage::Unorm8 => out.push(u8::MAX),
        ChannelStorage::Unorm16 => out.extend_from_slice(&u16::MAX.to_le_bytes()),
        ChannelStorage::Half => out.extend_from_slice(&f16::ONE.to_bits().to_le_bytes()),
        ChannelStorage::Float32 => out.extend_from_slice(&1.0f32.to_le_bytes()),
    }
}

/// Host pixel types with a statically known [`PixelFormat`].
pub trait Texel: Pod {
    const CHANNELS: u32;
    const DEPTH: BitDepth;

    fn format() -> PixelFormat {
        PixelFormat {
            channels: Self::CHANNELS,
            depth: Self::DEPTH,
        }
    }
}

macro_rules! impl_texel {
    ($($ty:ty => ($channels:expr, $depth:ident)),* $(,)?) => {
        $(
            impl Texel for $ty {
                const CHANNELS: u32 = $channels;
                const DEPTH: BitDepth = BitDepth::$depth;
            }
        )*
    };
}

impl_texel! {
    u8 => (1, U8),
    [u8; 2] => (2, U8),
    [u8; 3] => (3, U8),
    [u8; 4] => (4, U8),
    u16 => (1, U16),
    [u16; 2] => (2, U16),
    [u16; 3] => (3, U16),
    [u16; 4] => (4, U16),
    f32 => (1, F32),
    [f32; 2] => (2, F32),
    [f32; 3] => (3, F32),
    [f32; 4] => (4, F32),
    glam::Vec2 => (2, F32),
    glam::Vec3 => (3, F32),
    glam::Vec4 => (4, F32),
}

#[cfg(test)]
mod tests {
    use super::*;

    const NORM16: wgpu::Features = wgpu::Features::TEXTURE_FORMAT_16BIT_NORM;
    const FLOAT32: wgpu::Features = wgpu::Features::FLOAT32_FILTERABLE;

    fn storage(channels: u32, bits: u32, features: wgpu::Features) -> StorageFormat {
        PixelFormat::new(channels, bits).unwrap().storage(features)
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn channel_count_outside_one_to_four_fails() {
        assert!(matches!(PixelFormat::new(0, 8), Err(Error::InvalidChannelCount(0))));
        assert!(matches!(PixelFormat::new(5, 8), Err(Error::InvalidChannelCount(5))));
    }

    #[test]
    fn unsupported_bit_depth_fails() {
        assert!(matches!(PixelFormat::new(3, 12), Err(Error::InvalidBitDepth(12))));
    }

    // ── inference ─────────────────────────────────────────────────────────

    #[test]
    fn eight_bit_storage_follows_channel_count() {
        use wgpu::TextureFormat as F;
        let fmt = |c| storage(c, 8, wgpu::Features::empty()).texture_format();
        assert_eq!(fmt(1), F::R8Unorm);
        assert_eq!(fmt(2), F::Rg8Unorm);
        assert_eq!(fmt(3), F::Rgba8Unorm);
        assert_eq!(fmt(4), F::Rgba8Unorm);
    }

    #[test]
    fn wide_storage_depends_on_device_features() {
        use wgpu::TextureFormat as F;
        let none = wgpu::Features::empty();
        assert_eq!(storage(1, 16, NORM16).texture_format(), F::R16Unorm);
        assert_eq!(storage(3, 16, NORM16).texture_format(), F::Rgba16Unorm);
        assert_eq!(storage(1, 16, none).texture_format(), F::R16Float);
        assert_eq!(storage(2, 32, FLOAT32).texture_format(), F::Rg32Float);
        assert_eq!(storage(4, 32, FLOAT32).texture_format(), F::Rgba32Float);
        assert_eq!(storage(3, 32, none).texture_format(), F::Rgba16Float);
        // Each feature only widens its own depth.
        assert_eq!(storage(1, 32, NORM16).channel(), ChannelStorage::Half);
        assert_eq!(storage(1, 16, FLOAT32).channel(), ChannelStorage::Half);
    }

    #[test]
    fn texel_types_carry_their_format() {
        assert_eq!(<[u8; 3]>::format(), PixelFormat::new(3, 8).unwrap());
        assert_eq!(u16::format(), PixelFormat::new(1, 16).unwrap());
        assert_eq!(glam::Vec4::format(), PixelFormat::new(4, 32).unwrap());
    }

    // ── conversion ────────────────────────────────────────────────────────

    #[test]
    fn rgba8_is_copied_unchanged() {
        let src = [1u8, 2, 3, 4];
        let fmt = PixelFormat::RGBA8.storage(wgpu::Features::empty());
        assert!(matches!(fmt.convert(&src), Cow::Borrowed(_)));
    }

    #[test]
    fn rgb8_gains_opaque_alpha() {
        let out = storage(3, 8, wgpu::Features::empty()).convert(&[10, 20, 30, 40, 50, 60]);
        assert_eq!(&*out, &[10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn adjacent_u16_values_stay_distinct_in_unorm16() {
        let fmt = storage(1, 16, NORM16);
        let src: Vec<u8> = [60000u16, 60001].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let out = fmt.convert(&src);
        let values: Vec<u16> = out.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        assert_eq!(values, vec![60000, 60001]);
    }

    #[test]
    fn rgb16_gains_full_scale_alpha() {
        let fmt = storage(3, 16, NORM16);
        let src: Vec<u8> = [1u16, 2, 3].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let out = fmt.convert(&src);
        assert_eq!(out.len(), fmt.bytes_per_pixel());
        assert_eq!(&out[6..], &u16::MAX.to_le_bytes());
    }

    #[test]
    fn f32_keeps_full_precision_when_filterable() {
        let fmt = storage(1, 32, FLOAT32);
        let src = 1.000_001f32.to_ne_bytes();
        let out = fmt.convert(&src);
        assert_eq!(f32::from_le_bytes([out[0], out[1], out[2], out[3]]), 1.000_001);
    }

    #[test]
    fn u16_falls_back_to_half() {
        let fmt = storage(1, 16, wgpu::Features::empty());
        let src: Vec<u8> = [u16::MAX, 0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let out = fmt.convert(&src);
        assert_eq!(&*out, &[0x00, 0x3C, 0x00, 0x00]);
    }

    #[test]
    fn float_rgb_falls_back_to_half_rgba() {
        let fmt = storage(3, 32, wgpu::Features::empty());
        let src: Vec<u8> = [0.5f32, 1.0, 2.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let out = fmt.convert(&src);
        assert_eq!(out.len(), fmt.bytes_per_pixel());
        let halves: Vec<f32> = out
            .chunks_exact(2)
            .map(|c| f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
            .collect();
        assert_eq!(halves, vec![0.5, 1.0, 2.0, 1.0]);
    }
}
