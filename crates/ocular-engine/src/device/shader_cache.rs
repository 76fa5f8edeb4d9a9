use std::collections::HashMap;
use std::sync::Arc;

/// Identifies one render pipeline variant.
///
/// The same shader program is compiled into one pipeline per attachment
/// configuration, so a renderer shared by two displays with different surface
/// formats gets two cached pipelines.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PipelineKey {
    pub name: &'static str,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
}

/// Compiled GPU programs owned by a [`GpuContext`](super::GpuContext).
///
/// Entries are created on first request and live until the context is dropped
/// or [`clear`](Self::clear) is called.
#[derive(Default)]
pub struct ShaderCache {
    modules: HashMap<&'static str, Arc<wgpu::ShaderModule>>,
    layouts: HashMap<&'static str, Arc<wgpu::BindGroupLayout>>,
    render: HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,
    compute: HashMap<&'static str, Arc<wgpu::ComputePipeline>>,
}

impl ShaderCache {
    pub fn module(&self, name: &str) -> Option<Arc<wgpu::ShaderModule>> {
        self.modules.get(name).cloned()
    }

    pub fn layout(&self, name: &str) -> Option<Arc<wgpu::BindGroupLayout>> {
        self.layouts.get(name).cloned()
    }

    pub fn render_pipeline(&self, key: &PipelineKey) -> Option<Arc<wgpu::RenderPipeline>> {
        self.render.get(key).cloned()
    }

    pub fn compute_pipeline(&self, name: &str) -> Option<Arc<wgpu::ComputePipeline>> {
        self.compute.get(name).cloned()
    }

    pub(crate) fn insert_module(
        &mut self,
        name: &'static str,
        module: wgpu::ShaderModule,
    ) -> Arc<wgpu::ShaderModule> {
        self.modules.entry(name).or_insert_with(|| Arc::new(module)).clone()
    }

    pub(crate) fn insert_layout(
        &mut self,
        name: &'static str,
        layout: wgpu::BindGroupLayout,
    ) -> Arc<wgpu::BindGroupLayout> {
        self.layouts.entry(name).or_insert_with(|| Arc::new(layout)).clone()
    }

    pub(crate) fn insert_render_pipeline(
        &mut self,
        key: PipelineKey,
        pipeline: wgpu::RenderPipeline,
    ) -> Arc<wgpu::RenderPipeline> {
        self.render.entry(key).or_insert_with(|| Arc::new(pipeline)).clone()
    }

    pub(crate) fn insert_compute_pipeline(
        &mut self,
        name: &'static str,
        pipeline: wgpu::ComputePipeline,
    ) -> Arc<wgpu::ComputePipeline> {
        self.compute.entry(name).or_insert_with(|| Arc::new(pipeline)).clone()
    }

    /// Number of cached objects of all kinds.
    pub fn len(&self) -> usize {
        self.modules.len() + self.layouts.len() + self.render.len() + self.compute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached object.
    ///
    /// Renderers keep their own `Arc` clones, so pipelines already in use stay
    /// alive until those renderers rebuild or drop them.
    pub fn clear(&mut self) {
        self.modules.clear();
        self.layouts.clear();
        self.render.clear();
        self.compute.clear();
    }
}
