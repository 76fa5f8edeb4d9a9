use winit::dpi::PhysicalSize;

use crate::coords::Shape;
use crate::error::{Error, Result};

use super::{GpuContext, SurfaceFrame};

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

/// A window surface configured against a shared [`GpuContext`].
///
/// Surface lifetime is tied to the window via `'w`; the owner must ensure the
/// window outlives it.
pub struct DisplaySurface<'w> {
    surface: wgpu::Surface<'w>,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
}

impl<'w> DisplaySurface<'w> {
    /// Configures `surface` for presentation with the context's device.
    pub fn configure(
        ctx: &GpuContext,
        surface: wgpu::Surface<'w>,
        size: PhysicalSize<u32>,
    ) -> Result<Self> {
        let init = ctx.init();
        let caps = surface.get_capabilities(ctx.adapter());
        let format = choose_surface_format(&caps, init.prefer_srgb)
            .ok_or(Error::UnsupportedSurface)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: init.present_mode,
            alpha_mode: choose_alpha_mode(&caps, init.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };

        if size.width > 0 && size.height > 0 {
            surface.configure(ctx.device(), &config);
        }

        Ok(Self { surface, config, size })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Current drawable size in physical pixels.
    pub fn shape(&self) -> Shape {
        Shape::new(self.size.width, self.size.height)
    }

    /// Reconfigures the surface after a resize.
    ///
    /// wgpu does not support configuring a surface with a 0x0 size; in that
    /// case only the stored size changes and configuration is deferred.
    pub fn resize(&mut self, ctx: &GpuContext, new_size: PhysicalSize<u32>) {
        self.size = new_size;
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(ctx.device(), &self.config);
    }

    /// Acquires the next surface texture.
    pub fn acquire(&self) -> std::result::Result<SurfaceFrame, wgpu::SurfaceError> {
        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        Ok(SurfaceFrame { surface_texture, view })
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_error(&mut self, ctx: &GpuContext, err: wgpu::SurfaceError) -> SurfaceErrorAction {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                if self.size.width > 0 && self.size.height > 0 {
                    self.surface.configure(ctx.device(), &self.config);
                }
                SurfaceErrorAction::Reconfigured
            }
            wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
            wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
        }
    }
}

fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        if let Some(f) = preferred.into_iter().find(|f| caps.formats.contains(f)) {
            return Some(f);
        }
    }

    caps.formats.first().copied()
}

fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}
