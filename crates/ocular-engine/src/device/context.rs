use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{Error, Result};

use super::{GpuInit, PipelineKey, ShaderCache};

/// Shared handle to a [`GpuContext`].
pub type SharedContext = Rc<GpuContext>;

/// Device-level GPU state shared by displays, renderers and buffers.
///
/// This type is the resource-sharing context:
/// - creates and stores Instance/Adapter/Device/Queue
/// - owns the shader cache, so compiled programs live exactly as long as the
///   device that compiled them
/// - is handed explicitly to every object that allocates GPU memory
///
/// Displays created from the same context can draw the same renderers.
pub struct GpuContext {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    init: GpuInit,
    shaders: RefCell<ShaderCache>,
}

impl GpuContext {
    /// Creates the wgpu instance a context and its surfaces are built from.
    pub fn create_instance(init: &GpuInit) -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        })
    }

    /// Creates a context without any presentation surface.
    pub async fn headless(init: GpuInit) -> Result<Self> {
        let instance = Self::create_instance(&init);
        Self::from_instance(instance, init, None).await
    }

    /// Creates a context from an existing instance.
    ///
    /// Pass the first window's surface as `compatible_surface` so the adapter
    /// is guaranteed to present to it.
    pub async fn from_instance(
        instance: wgpu::Instance,
        init: GpuInit,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface,
                force_fallback_adapter: init.force_fallback_adapter,
            })
            .await
            .map_err(|e| Error::NoAdapter(e.to_string()))?;

        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let features = init.required_features | (init.optional_features & adapter.features());
        log::debug!("device features: {features:?}");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("ocular device"),
                required_features: features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            init,
            shaders: RefCell::new(ShaderCache::default()),
        })
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn init(&self) -> &GpuInit {
        &self.init
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Features the device was created with.
    pub fn features(&self) -> wgpu::Features {
        self.device.features()
    }

    pub(crate) fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    pub(crate) fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Blocks until all submitted work has completed.
    pub fn wait_idle(&self) -> Result<()> {
        self.device.poll(wgpu::PollType::wait_indefinitely())?;
        Ok(())
    }

    // ── shader cache ───────────────────────────────────────────────────────

    /// Returns the compiled WGSL module registered under `name`, compiling it
    /// on first use.
    pub fn shader(&self, name: &'static str, source: &'static str) -> Arc<wgpu::ShaderModule> {
        if let Some(module) = self.shaders.borrow().module(name) {
            return module;
        }

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        log::debug!("compiled shader module {name}");

        self.shaders.borrow_mut().insert_module(name, module)
    }

    pub fn bind_group_layout(
        &self,
        name: &'static str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Arc<wgpu::BindGroupLayout> {
        if let Some(layout) = self.shaders.borrow().layout(name) {
            return layout;
        }

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(name),
                entries,
            });

        self.shaders.borrow_mut().insert_layout(name, layout)
    }

    /// Returns the render pipeline for `key`, building it with `build` on
    /// first use.
    pub fn render_pipeline<F>(&self, key: PipelineKey, build: F) -> Arc<wgpu::RenderPipeline>
    where
        F: FnOnce(&Self) -> wgpu::RenderPipeline,
    {
        if let Some(pipeline) = self.shaders.borrow().render_pipeline(&key) {
            return pipeline;
        }

        let pipeline = build(self);
        log::debug!(
            "created render pipeline {} ({:?}, depth {:?})",
            key.name,
            key.color_format,
            key.depth_format
        );

        self.shaders.borrow_mut().insert_render_pipeline(key, pipeline)
    }

    /// Returns the compute pipeline registered under `name`.
    ///
    /// The shader's entry point must be `main`.
    pub fn compute_pipeline(
        &self,
        name: &'static str,
        source: &'static str,
        layout: &wgpu::BindGroupLayout,
    ) -> Arc<wgpu::ComputePipeline> {
        if let Some(pipeline) = self.shaders.borrow().compute_pipeline(name) {
            return pipeline;
        }

        let module = self.shader(name, source);
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(name),
                bind_group_layouts: &[layout],
                immediate_size: 0,
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(name),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });
        log::debug!("created compute pipeline {name}");

        self.shaders.borrow_mut().insert_compute_pipeline(name, pipeline)
    }

    /// Number of objects currently held by the shader cache.
    pub fn cached_programs(&self) -> usize {
        self.shaders.borrow().len()
    }

    /// Releases every cached program.
    pub fn clear_shader_cache(&self) {
        self.shaders.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::testing;

    const NOOP_COMPUTE: &str = "@compute @workgroup_size(1) fn main() {}";

    #[test]
    fn shader_is_compiled_once_per_name() {
        let Some(ctx) = testing::context() else { return };

        let a = ctx.shader("noop", NOOP_COMPUTE);
        let b = ctx.shader("noop", NOOP_COMPUTE);

        assert!(std::sync::Arc::ptr_eq(&a, &b));
        assert_eq!(ctx.cached_programs(), 1);
    }

    #[test]
    fn clear_shader_cache_empties_cache() {
        let Some(ctx) = testing::context() else { return };

        let layout = ctx.bind_group_layout("noop layout", &[]);
        let _ = ctx.compute_pipeline("noop", NOOP_COMPUTE, &layout);
        assert_eq!(ctx.cached_programs(), 3);

        ctx.clear_shader_cache();
        assert_eq!(ctx.cached_programs(), 0);
    }
}
