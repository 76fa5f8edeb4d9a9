//! Compute dispatch helpers shared by mesh transforms and normal lines.
//!
//! Every dispatch is recorded in its own compute pass. The pass boundary
//! orders its writes before any later pass reads them, and the bind group
//! does not outlive the pass.

use bytemuck::Pod;
use wgpu::util::DeviceExt;

use crate::device::GpuContext;

/// Invocations per workgroup. Must match `@workgroup_size` in the shaders.
pub(crate) const WORKGROUP_SIZE: u32 = 128;

/// Workgroups needed to cover `n` elements, clamped to the device limit.
///
/// Shaders stride by the total invocation count, so a clamped dispatch still
/// covers every element.
pub(crate) fn dispatch_count(n: u32, max_workgroups: u32) -> u32 {
    n.div_ceil(WORKGROUP_SIZE).clamp(1, max_workgroups.max(1))
}

pub(crate) fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn params_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Creates the uniform buffer carrying a dispatch's parameters.
pub(crate) fn params_buffer<P: Pod>(ctx: &GpuContext, label: &str, params: &P) -> wgpu::Buffer {
    ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(params),
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

/// Records one dispatch covering `n` elements in a pass of its own.
///
/// Nothing is recorded for `n == 0`.
pub(crate) fn dispatch(
    ctx: &GpuContext,
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    n: u32,
) {
    if n == 0 {
        return;
    }

    let groups = dispatch_count(n, ctx.limits().max_compute_workgroups_per_dimension);
    let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    cpass.set_pipeline(pipeline);
    cpass.set_bind_group(0, bind_group, &[]);
    cpass.dispatch_workgroups(groups, 1, 1);
}
