use std::path::Path;

use crate::coords::Shape;
use crate::device::SharedContext;
use crate::error::{Error, Result};

use super::{DecodedImage, GpuVector, PixelFormat, StorageFormat, Texel};

/// Texture view and sampler borrowed for the duration of one binding.
///
/// Bind groups built from it cannot outlive the texture; storage
/// reallocation requires `&mut GpuTexture` and therefore ends every binding.
pub struct TextureBinding<'a> {
    pub view: &'a wgpu::TextureView,
    pub sampler: &'a wgpu::Sampler,
}

/// A 2D texture with a format derived from its pixel data and the device.
///
/// See [`PixelFormat::storage`] for how the storage format is chosen.
/// Storage is reallocated only when the shape or storage format changes.
/// Sampling uses linear min/mag filtering with clamp-to-edge addressing.
pub struct GpuTexture {
    ctx: SharedContext,
    label: &'static str,
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    sampler: wgpu::Sampler,
    shape: Shape,
    format: Option<PixelFormat>,
    generation: u64,
}

impl GpuTexture {
    pub fn new(ctx: SharedContext) -> Self {
        Self::labeled(ctx, "ocular texture")
    }

    pub fn labeled(ctx: SharedContext, label: &'static str) -> Self {
        let sampler = ctx.device().create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Self {
            ctx,
            label,
            texture: None,
            view: None,
            sampler,
            shape: Shape::default(),
            format: None,
            generation: 0,
        }
    }

    /// Decodes the image at `path` into a new texture.
    pub fn from_file(ctx: SharedContext, path: impl AsRef<Path>) -> Result<Self> {
        let decoded = DecodedImage::open(path)?;
        let mut texture = Self::new(ctx);
        texture.set_decoded(&decoded)?;
        Ok(texture)
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn format(&self) -> Option<PixelFormat> {
        self.format
    }

    /// Storage of the current contents, `None` while empty.
    pub fn storage(&self) -> Option<StorageFormat> {
        self.format.map(|f| self.storage_for(f))
    }

    fn storage_for(&self, format: PixelFormat) -> StorageFormat {
        format.storage(self.ctx.features())
    }

    pub fn is_empty(&self) -> bool {
        self.texture.is_none()
    }

    /// Counts storage (re)allocations.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn texture(&self) -> Option<&wgpu::Texture> {
        self.texture.as_ref()
    }

    /// Borrows the view and sampler for binding, `None` while empty.
    pub fn binding(&self) -> Option<TextureBinding<'_>> {
        Some(TextureBinding {
            view: self.view.as_ref()?,
            sampler: &self.sampler,
        })
    }

    /// Releases the storage.
    pub fn clear(&mut self) {
        self.texture = None;
        self.view = None;
        self.shape = Shape::default();
        self.format = None;
    }

    /// Ensures storage of `shape` in `format` without uploading anything.
    ///
    /// Storage allows rendering into the texture when its format is
    /// color-renderable on this device.
    pub fn allocate(&mut self, shape: Shape, format: PixelFormat) {
        if shape.is_empty() {
            self.clear();
            return;
        }

        let storage = self.storage_for(format);
        let reusable = self.texture.is_some()
            && self.shape == shape
            && self.storage().map(StorageFormat::texture_format) == Some(storage.texture_format());
        self.format = Some(format);
        if reusable {
            return;
        }

        let format_features = storage
            .texture_format()
            .guaranteed_format_features(self.ctx.features());
        let texture = self.ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(self.label),
            size: shape.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: storage.texture_format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | (format_features.allowed_usages & wgpu::TextureUsages::RENDER_ATTACHMENT),
            view_formats: &[],
        });

        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);
        self.shape = shape;
        self.generation += 1;
        log::debug!(
            "{}: allocated {}x{} {:?}",
            self.label,
            shape.width,
            shape.height,
            storage.texture_format()
        );
    }

    /// Uploads `data`, one texel per pixel, row-major with the top row first.
    pub fn set_image<T: Texel>(&mut self, shape: Shape, data: &[T]) -> Result<()> {
        check_len("texels", shape.area(), data.len())?;
        self.set_image_bytes(shape, T::format(), bytemuck::cast_slice(data))
    }

    /// Uploads tightly packed pixel bytes described by `format`.
    pub fn set_image_bytes(&mut self, shape: Shape, format: PixelFormat, bytes: &[u8]) -> Result<()> {
        check_len("pixel bytes", shape.area() * format.bytes_per_pixel(), bytes.len())?;
        self.allocate(shape, format);

        let Some(texture) = self.texture.as_ref() else { return Ok(()) };
        let storage = self.storage_for(format);
        let data = storage.convert(bytes);
        self.ctx.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(shape.width * storage.bytes_per_pixel() as u32),
                rows_per_image: Some(shape.height),
            },
            shape.extent(),
        );
        Ok(())
    }

    pub fn set_decoded(&mut self, image: &DecodedImage) -> Result<()> {
        self.set_image_bytes(image.shape(), image.format()?, &image.bytes)
    }

    /// Uploads pixels held in a GPU vector.
    ///
    /// Copies device-to-device when the vector's rows already match the
    /// storage layout and copy alignment; otherwise reads the pixels back and
    /// converts them on the host.
    pub fn set_image_from_vector<T: Texel>(&mut self, shape: Shape, pixels: &GpuVector<T>) -> Result<()> {
        pixels.ensure_unmapped()?;
        check_len("texels", shape.area(), pixels.len())?;

        let format = T::format();
        let row_bytes = shape.width * format.bytes_per_pixel() as u32;
        let direct = self.storage_for(format).is_host_layout()
            && row_bytes % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT == 0;
        if !direct {
            log::debug!("{}: staging {}x{} pixels through the host", self.label, shape.width, shape.height);
            let data = pixels.to_vec()?;
            return self.set_image(shape, &data);
        }

        self.allocate(shape, format);
        let (Some(texture), Some(buffer)) = (self.texture.as_ref(), pixels.buffer()) else {
            return Ok(());
        };

        let mut encoder = self.ctx.create_encoder("ocular texture upload");
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(row_bytes),
                    rows_per_image: Some(shape.height),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            shape.extent(),
        );
        self.ctx.submit(encoder);
        Ok(())
    }

    /// Replaces this texture's contents with a device-side copy of `other`.
    pub fn copy_from_texture(&mut self, other: &GpuTexture) -> Result<()> {
        let (Some(src), Some(format)) = (other.texture.as_ref(), other.format) else {
            self.clear();
            return Ok(());
        };

        self.allocate(other.shape, format);
        let Some(dst) = self.texture.as_ref() else { return Ok(()) };

        let mut encoder = self.ctx.create_encoder("ocular texture copy");
        encoder.copy_texture_to_texture(
            src.as_image_copy(),
            dst.as_image_copy(),
            other.shape.extent(),
        );
        self.ctx.submit(encoder);
        Ok(())
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::SizeMismatch { what, expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn new_texture_is_empty() {
        let Some(ctx) = testing::context() else { return };
        let tex = GpuTexture::new(ctx);
        assert!(tex.is_empty());
        assert!(tex.binding().is_none());
        assert_eq!(tex.shape(), Shape::default());
    }

    #[test]
    fn wrong_pixel_count_is_rejected() {
        let Some(ctx) = testing::context() else { return };
        let mut tex = GpuTexture::new(ctx);
        let err = tex.set_image(Shape::new(2, 2), &[[0u8; 4]; 3]).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 4, actual: 3, .. }));
        assert!(tex.is_empty());
    }

    #[test]
    fn same_shape_reuses_storage() {
        let Some(ctx) = testing::context() else { return };
        let mut tex = GpuTexture::new(ctx);

        tex.set_image(Shape::new(4, 2), &[0.5f32; 8]).unwrap();
        let generation = tex.generation();
        tex.set_image(Shape::new(4, 2), &[1.0f32; 8]).unwrap();
        assert_eq!(tex.generation(), generation);

        tex.set_image(Shape::new(2, 2), &[1.0f32; 4]).unwrap();
        assert_eq!(tex.generation(), generation + 1);
        assert_eq!(tex.format(), Some(PixelFormat::new(1, 32).unwrap()));
    }

    #[test]
    fn empty_shape_releases_storage() {
        let Some(ctx) = testing::context() else { return };
        let mut tex = GpuTexture::new(ctx);
        tex.set_image(Shape::new(1, 1), &[[1u8, 2, 3]]).unwrap();
        tex.set_image::<[u8; 3]>(Shape::new(0, 0), &[]).unwrap();
        assert!(tex.is_empty());
    }

    #[test]
    fn vector_upload_and_texture_copy() {
        let Some(ctx) = testing::context() else { return };

        // 64 RGBA8 pixels per row = 256 bytes: direct copy path.
        let pixels = GpuVector::from_slice(ctx.clone(), &[[255u8, 0, 0, 255]; 64 * 2]);
        let mut tex = GpuTexture::new(ctx.clone());
        tex.set_image_from_vector(Shape::new(64, 2), &pixels).unwrap();
        assert_eq!(tex.shape(), Shape::new(64, 2));

        // Unaligned rows take the host path.
        let rgb = GpuVector::from_slice(ctx.clone(), &[[1u8, 2, 3]; 6]);
        let mut small = GpuTexture::new(ctx.clone());
        small.set_image_from_vector(Shape::new(3, 2), &rgb).unwrap();
        assert_eq!(small.format(), Some(PixelFormat::new(3, 8).unwrap()));

        let mut copy = GpuTexture::new(ctx);
        copy.copy_from_texture(&tex).unwrap();
        assert_eq!(copy.shape(), tex.shape());
        assert_eq!(copy.format(), tex.format());
    }

    #[test]
    fn sixteen_bit_texture_keeps_its_precision_when_supported() {
        let Some(ctx) = testing::context() else { return };
        let norm = ctx.features().contains(wgpu::Features::TEXTURE_FORMAT_16BIT_NORM);
        let mut tex = GpuTexture::new(ctx);
        tex.set_image(Shape::new(2, 1), &[60000u16, 60001]).unwrap();

        let expected = if norm { wgpu::TextureFormat::R16Unorm } else { wgpu::TextureFormat::R16Float };
        assert_eq!(tex.texture().unwrap().format(), expected);
        assert_eq!(tex.storage().unwrap().texture_format(), expected);
    }
}
