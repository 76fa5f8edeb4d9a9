use std::time::Instant;

use winit::dpi::PhysicalSize;

use crate::coords::{Color, Shape};
use crate::device::{DisplaySurface, GpuContext, GpuInit, SharedContext, SurfaceErrorAction};
use crate::error::{Error, Result};
use crate::input::{InputEvent, KeyEvent, MouseButtonEvent, MousePositionEvent, ScrollEvent};
use crate::render::{FrameStats, SharedRenderer};
use crate::time::{FrameCounter, FrameLimiter};
use crate::view::SharedView;

use super::frame::{insert_view, render_frame, DepthTexture, FrameTargets};
use super::{CallbackId, DisplayConfig, EventCallbacks, SharedEventHandler};

/// Drives the frames of one window surface.
///
/// A display owns its surface, depth attachment, the views and renderers it
/// draws, and its input callbacks. Renderers and views are shared, so the
/// same renderer can be drawn by several displays created from one context.
pub struct Display<'w> {
    ctx: SharedContext,
    surface: DisplaySurface<'w>,
    depth: DepthTexture,
    views: Vec<SharedView>,
    renderers: Vec<SharedRenderer>,
    callbacks: EventCallbacks,
    clear_color: Color,
    counter: Option<FrameCounter>,
    limiter: Option<FrameLimiter>,
}

impl<'w> Display<'w> {
    /// Creates a display on an existing context. `surface` must come from
    /// the context's instance.
    pub fn new(
        ctx: SharedContext,
        surface: wgpu::Surface<'w>,
        size: PhysicalSize<u32>,
        config: &DisplayConfig,
    ) -> Result<Self> {
        let surface = DisplaySurface::configure(&ctx, surface, size)?;
        let depth = DepthTexture::new(&ctx, surface.shape());

        let mut display = Self {
            ctx,
            surface,
            depth,
            views: Vec::new(),
            renderers: Vec::new(),
            callbacks: EventCallbacks::new(),
            clear_color: config.clear_color,
            counter: None,
            limiter: None,
        };
        if config.frame_counter {
            display.enable_frame_counter();
        }
        if let Some(fps) = config.max_fps {
            display.limit_frame_rate(fps);
        }
        Ok(display)
    }

    /// Creates a display together with a new context whose adapter can
    /// present to `surface`. Blocks on adapter and device creation.
    pub fn with_new_context(
        instance: wgpu::Instance,
        surface: wgpu::Surface<'w>,
        size: PhysicalSize<u32>,
        init: GpuInit,
        config: &DisplayConfig,
    ) -> Result<Self> {
        let ctx = pollster::block_on(GpuContext::from_instance(instance, init, Some(&surface)))?;
        Self::new(SharedContext::new(ctx), surface, size, config)
    }

    /// The context to create renderers and further displays from.
    pub fn context(&self) -> &SharedContext {
        &self.ctx
    }

    pub fn shape(&self) -> Shape {
        self.surface.shape()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.surface.format()
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    // ── scene ──────────────────────────────────────────────────────────────

    /// Registers a view to receive the surface shape each frame. Adding the
    /// same view twice has no effect.
    pub fn add_view(&mut self, view: SharedView) {
        insert_view(&mut self.views, view);
    }

    /// Appends a renderer to the draw order and registers its view.
    pub fn add_renderer(&mut self, renderer: SharedRenderer) {
        let view = renderer.borrow().view();
        self.add_view(view);
        self.renderers.push(renderer);
    }

    pub fn remove_renderer(&mut self, renderer: &SharedRenderer) {
        self.renderers.retain(|r| !std::rc::Rc::ptr_eq(r, renderer));
    }

    pub fn views(&self) -> &[SharedView] {
        &self.views
    }

    pub fn renderers(&self) -> &[SharedRenderer] {
        &self.renderers
    }

    // ── input ──────────────────────────────────────────────────────────────

    pub fn add_event_handler(&mut self, handler: SharedEventHandler) {
        self.callbacks.add_handler(handler);
    }

    pub fn add_key_callback(&mut self, callback: impl FnMut(&KeyEvent) + 'static) -> CallbackId {
        self.callbacks.add_key_callback(callback)
    }

    pub fn add_mouse_position_callback(
        &mut self,
        callback: impl FnMut(&MousePositionEvent) + 'static,
    ) -> CallbackId {
        self.callbacks.add_mouse_position_callback(callback)
    }

    pub fn add_mouse_button_callback(
        &mut self,
        callback: impl FnMut(&MouseButtonEvent) + 'static,
    ) -> CallbackId {
        self.callbacks.add_mouse_button_callback(callback)
    }

    pub fn add_scroll_callback(&mut self, callback: impl FnMut(&ScrollEvent) + 'static) -> CallbackId {
        self.callbacks.add_scroll_callback(callback)
    }

    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        self.callbacks.remove_callback(id)
    }

    pub fn callbacks_mut(&mut self) -> &mut EventCallbacks {
        &mut self.callbacks
    }

    /// Delivers `event` to the callbacks, then to the handlers.
    pub fn handle_event(&mut self, event: &InputEvent) {
        self.callbacks.dispatch(event);
    }

    // ── frames ─────────────────────────────────────────────────────────────

    /// Reconfigures the surface and depth attachment for a new size.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.surface.resize(&self.ctx, size);
        let shape = self.surface.shape();
        if !shape.is_empty() {
            self.depth.ensure(&self.ctx, shape);
        }
    }

    /// Renders and presents one frame.
    ///
    /// Returns `Ok(None)` when the frame was skipped: a zero-sized surface,
    /// or a lost, outdated or timed-out surface texture. Running out of
    /// memory is an error.
    pub fn draw(&mut self) -> Result<Option<FrameStats>> {
        let shape = self.surface.shape();
        if shape.is_empty() {
            return Ok(None);
        }

        let frame = match self.surface.acquire() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("surface error: {err}");
                return match self.surface.handle_error(&self.ctx, err) {
                    SurfaceErrorAction::Fatal => Err(Error::Surface(wgpu::SurfaceError::OutOfMemory)),
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => Ok(None),
                };
            }
        };

        self.depth.ensure(&self.ctx, shape);
        let targets = FrameTargets {
            color_view: &frame.view,
            color_format: self.surface.format(),
            depth_view: self.depth.view(),
            shape,
        };
        let stats = render_frame(&self.ctx, &self.views, &self.renderers, &targets, self.clear_color)?;
        frame.present();

        if let Some(counter) = self.counter.as_mut() {
            if let Some(fps) = counter.tick(Instant::now()) {
                log::info!("{fps:.1} fps");
            }
        }
        if let Some(limiter) = self.limiter.as_mut() {
            limiter.wait();
        }
        Ok(Some(stats))
    }

    pub fn enable_frame_counter(&mut self) {
        self.counter.get_or_insert_with(FrameCounter::default);
    }

    pub fn disable_frame_counter(&mut self) {
        self.counter = None;
    }

    /// Last frames-per-second report, while the counter is enabled.
    pub fn fps(&self) -> Option<f32> {
        self.counter.as_ref().and_then(FrameCounter::fps)
    }

    /// Sleeps after each present so at most `fps` frames are drawn per
    /// second.
    pub fn limit_frame_rate(&mut self, fps: f32) {
        self.limiter = Some(FrameLimiter::new(fps));
    }

    pub fn free_frame_rate(&mut self) {
        self.limiter = None;
    }
}
