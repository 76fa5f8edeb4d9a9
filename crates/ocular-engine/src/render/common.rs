//! Shared GPU types and pipeline plumbing used by all renderers.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::coords::Color;
use crate::device::{GpuContext, PipelineKey};
use crate::gpu::TextureBinding;

use super::{RenderTarget, DEPTH_FORMAT};

// ── blend ─────────────────────────────────────────────────────────────────

pub(super) fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

// ── draw uniform ──────────────────────────────────────────────────────────

/// Per-draw uniform (80 bytes): clip transform and premultiplied color.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct DrawUniform {
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl DrawUniform {
    pub(super) fn new(transform: Mat4, color: Color) -> Self {
        Self {
            transform: transform.to_cols_array_2d(),
            color: color.premultiplied(),
        }
    }
}

/// Returns the `wgpu` minimum binding size for a uniform of type `U`.
pub(super) fn min_binding_size<U>() -> Option<std::num::NonZeroU64> {
    std::num::NonZeroU64::new(std::mem::size_of::<U>() as u64)
}

/// Uniform storage of one renderer.
///
/// Every write creates a buffer initialized with its value, so each draw
/// recorded into an encoder keeps its own uniform even when the renderer
/// draws again before the encoder is submitted. The previous buffer stays
/// alive for as long as recorded work refers to it.
pub(super) struct UniformSlot<U: Pod> {
    label: &'static str,
    buffer: Option<wgpu::Buffer>,
    _marker: std::marker::PhantomData<U>,
}

impl<U: Pod> UniformSlot<U> {
    pub(super) fn new(label: &'static str) -> Self {
        Self {
            label,
            buffer: None,
            _marker: std::marker::PhantomData,
        }
    }

    pub(super) fn write(&mut self, ctx: &GpuContext, value: &U) -> &wgpu::Buffer {
        self.buffer.insert(ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(self.label),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM,
        }))
    }
}

// ── layouts ───────────────────────────────────────────────────────────────

fn uniform_entry<U>(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: min_binding_size::<U>(),
        },
        count: None,
    }
}

/// Layout with a single uniform of type `U` at binding 0.
pub(super) fn uniform_layout<U>(ctx: &GpuContext, name: &'static str) -> Arc<wgpu::BindGroupLayout> {
    ctx.bind_group_layout(name, &[uniform_entry::<U>(0)])
}

/// Layout with a single [`DrawUniform`].
pub(super) fn draw_layout(ctx: &GpuContext) -> Arc<wgpu::BindGroupLayout> {
    uniform_layout::<DrawUniform>(ctx, "ocular draw layout")
}

/// Layout with a [`DrawUniform`], a filterable 2D texture and its sampler.
pub(super) fn textured_layout(ctx: &GpuContext) -> Arc<wgpu::BindGroupLayout> {
    ctx.bind_group_layout(
        "ocular textured layout",
        &[
            uniform_entry::<DrawUniform>(0),
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    )
}

pub(super) fn uniform_bind_group(
    ctx: &GpuContext,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    uniform: &wgpu::Buffer,
) -> wgpu::BindGroup {
    ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        }],
    })
}

/// Bind group for [`textured_layout`]. Build it per draw; it refers to the
/// texture's current storage.
pub(super) fn textured_bind_group(
    ctx: &GpuContext,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    uniform: &wgpu::Buffer,
    texture: &TextureBinding<'_>,
) -> wgpu::BindGroup {
    ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(texture.sampler),
            },
        ],
    })
}

// ── vertex layouts ────────────────────────────────────────────────────────

pub(super) const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

/// Tightly packed `Vec3` positions at location 0.
pub(super) fn position_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &POSITION_ATTRS,
    }
}

/// Position and texture coordinate of a textured quad corner.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct TexturedVertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
}

impl TexturedVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub(super) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TexturedVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Two triangles covering a quad given as bottom-left, bottom-right,
/// top-right, top-left.
pub(super) const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

// ── pipelines ─────────────────────────────────────────────────────────────

pub(super) const FLAT_SHADER: (&str, &str) = ("ocular flat", include_str!("shaders/flat.wgsl"));
pub(super) const TEXTURED_SHADER: (&str, &str) = ("ocular textured", include_str!("shaders/textured.wgsl"));

/// How a pipeline uses the depth attachment, when the target has one.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(super) enum DepthMode {
    /// Drawn over everything, leaves depth untouched.
    Overlay,
    /// Depth tested with `Less` and written.
    Test,
}

fn depth_state(mode: DepthMode) -> wgpu::DepthStencilState {
    let (depth_compare, depth_write_enabled) = match mode {
        DepthMode::Overlay => (wgpu::CompareFunction::Always, false),
        DepthMode::Test => (wgpu::CompareFunction::Less, true),
    };
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled,
        depth_compare,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

/// Pipeline names must be unique per combination of the other fields.
pub(super) struct PipelineDesc<'a> {
    pub name: &'static str,
    /// WGSL module name and source, compiled once per context.
    pub shader: (&'static str, &'static str),
    pub layout: &'a wgpu::BindGroupLayout,
    pub buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub topology: wgpu::PrimitiveTopology,
    pub depth: DepthMode,
}

/// Returns the cached pipeline for `desc` matching the target's formats.
///
/// The shader's entry points must be `vs_main` and `fs_main`.
pub(super) fn render_pipeline(
    ctx: &GpuContext,
    target: &RenderTarget<'_>,
    desc: &PipelineDesc<'_>,
) -> Arc<wgpu::RenderPipeline> {
    render_pipeline_for(ctx, target.color_format, target.depth_format(), desc)
}

pub(super) fn render_pipeline_for(
    ctx: &GpuContext,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    desc: &PipelineDesc<'_>,
) -> Arc<wgpu::RenderPipeline> {
    let key = PipelineKey {
        name: desc.name,
        color_format,
        depth_format,
    };

    ctx.render_pipeline(key, |ctx| {
        let shader = ctx.shader(desc.shader.0, desc.shader.1);
        let pipeline_layout = ctx.device().create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.name),
            bind_group_layouts: &[desc.layout],
            immediate_size: 0,
        });

        ctx.device().create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.name),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: desc.buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(premul_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: desc.topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: depth_format.map(|_| depth_state(desc.depth)),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    })
}
