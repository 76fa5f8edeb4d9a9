//! Triangle meshes, on the host and on the GPU.
//!
//! [`GpuMesh`] runs the mesh transforms as compute dispatches: expanding an
//! indexed mesh into a flat triangle list and deriving flat per-vertex
//! normals.

pub(crate) mod compute;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::device::{GpuContext, SharedContext};
use crate::error::{Error, Result};
use crate::gpu::GpuVector;

/// Host-side mesh data.
///
/// Faces index into `points` and wind counter-clockwise when seen from
/// outside. `uvs` and `normals` are per point and optional (empty).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub points: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Axis-aligned cube of edge `scale`, centered on the origin.
    pub fn cube(scale: f32) -> Self {
        let h = scale * 0.5;
        let points = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -h } else { h },
                    if i & 2 == 0 { -h } else { h },
                    if i & 4 == 0 { -h } else { h },
                )
            })
            .collect();

        #[rustfmt::skip]
        let faces = vec![
            [0, 2, 1], [1, 2, 3], // -z
            [4, 5, 6], [5, 7, 6], // +z
            [0, 1, 4], [1, 5, 4], // -y
            [2, 6, 3], [3, 6, 7], // +y
            [0, 4, 2], [2, 4, 6], // -x
            [1, 3, 5], [3, 7, 5], // +x
        ];

        Self {
            points,
            faces,
            ..Self::default()
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct GatherParams {
    count: u32,
    width: u32,
    src_len: u32,
    _pad: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct NormalParams {
    triangles: u32,
    _pad: [u32; 3],
}

/// A mesh whose attributes live in GPU vectors.
///
/// While `faces` is non-empty the mesh is indexed. After
/// [`expand_vertices`](Self::expand_vertices) it is a flat triangle list:
/// `faces` is empty and every three consecutive points form a triangle.
pub struct GpuMesh {
    ctx: SharedContext,
    points: GpuVector<Vec3>,
    faces: GpuVector<[u32; 3]>,
    uvs: GpuVector<Vec2>,
    normals: GpuVector<Vec3>,
}

impl GpuMesh {
    pub fn new(ctx: SharedContext) -> Self {
        Self {
            points: GpuVector::labeled(ctx.clone(), "ocular mesh points"),
            faces: GpuVector::labeled(ctx.clone(), "ocular mesh faces"),
            uvs: GpuVector::labeled(ctx.clone(), "ocular mesh uvs"),
            normals: GpuVector::labeled(ctx.clone(), "ocular mesh normals"),
            ctx,
        }
    }

    pub fn from_mesh(ctx: SharedContext, mesh: &Mesh) -> Self {
        let mut gpu = Self::new(ctx);
        gpu.set_mesh(mesh);
        gpu
    }

    /// Uploads every attribute of `mesh`, reusing existing buffers.
    pub fn set_mesh(&mut self, mesh: &Mesh) {
        self.points.set_data(&mesh.points);
        self.faces.set_data(&mesh.faces);
        self.uvs.set_data(&mesh.uvs);
        self.normals.set_data(&mesh.normals);
    }

    pub fn points(&self) -> &GpuVector<Vec3> {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut GpuVector<Vec3> {
        &mut self.points
    }

    pub fn faces(&self) -> &GpuVector<[u32; 3]> {
        &self.faces
    }

    pub fn faces_mut(&mut self) -> &mut GpuVector<[u32; 3]> {
        &mut self.faces
    }

    pub fn uvs(&self) -> &GpuVector<Vec2> {
        &self.uvs
    }

    pub fn uvs_mut(&mut self) -> &mut GpuVector<Vec2> {
        &mut self.uvs
    }

    pub fn normals(&self) -> &GpuVector<Vec3> {
        &self.normals
    }

    pub fn normals_mut(&mut self) -> &mut GpuVector<Vec3> {
        &mut self.normals
    }

    pub fn is_indexed(&self) -> bool {
        !self.faces.is_empty()
    }

    /// Converts an indexed mesh into a flat triangle list.
    ///
    /// Points are gathered through the faces into `3 * faces` vertices. Normals
    /// and uvs are gathered the same way if they had one entry per point, and
    /// cleared otherwise. Faces are cleared afterwards. Does nothing for a mesh
    /// without faces.
    pub fn expand_vertices(&mut self) -> Result<()> {
        if self.faces.is_empty() {
            return Ok(());
        }
        self.points.ensure_unmapped()?;
        self.faces.ensure_unmapped()?;
        self.normals.ensure_unmapped()?;
        self.uvs.ensure_unmapped()?;

        let ctx = self.ctx.clone();
        let count = self.faces.len() * 3;
        let src_len = self.points.len();

        let layout = ctx.bind_group_layout(
            "ocular gather layout",
            &[
                compute::storage_entry(0, true),
                compute::storage_entry(1, true),
                compute::storage_entry(2, false),
                compute::params_entry(3),
            ],
        );
        let pipeline = ctx.compute_pipeline("ocular gather", include_str!("shaders/gather.wgsl"), &layout);

        let mut encoder = ctx.create_encoder("ocular expand vertices");
        let gather = Gather {
            ctx: &ctx,
            layout: &layout,
            pipeline: &pipeline,
            faces: &self.faces,
            count,
        };

        let points = gather.run(&mut encoder, &self.points);
        let normals = (self.normals.len() == src_len).then(|| gather.run(&mut encoder, &self.normals));
        let uvs = (self.uvs.len() == src_len).then(|| gather.run(&mut encoder, &self.uvs));
        ctx.submit(encoder);

        self.points = points;
        match normals {
            Some(normals) => self.normals = normals,
            None => self.normals.clear(),
        }
        match uvs {
            Some(uvs) => self.uvs = uvs,
            None => self.uvs.clear(),
        }
        self.faces.clear();

        log::debug!("expanded mesh to {count} vertices");
        Ok(())
    }

    /// Computes one flat normal per triangle and assigns it to the triangle's
    /// three vertices.
    ///
    /// Expands the mesh first. The normal of triangle `(p0, p1, p2)` is
    /// `normalize((p1 - p0) × (p2 - p0))`, so counter-clockwise triangles face
    /// the viewer. Fails with [`Error::NotTriangleList`] before touching the
    /// GPU if the point count is not a multiple of 3.
    pub fn compute_normals(&mut self) -> Result<()> {
        self.expand_vertices()?;

        let n = self.points.len();
        if n % 3 != 0 {
            return Err(Error::NotTriangleList(n));
        }
        self.points.ensure_unmapped()?;
        self.normals.ensure_unmapped()?;
        self.normals.resize(n);

        let (Some(points), Some(normals)) = (self.points.binding(), self.normals.binding()) else {
            return Ok(());
        };

        let ctx = &self.ctx;
        let layout = ctx.bind_group_layout(
            "ocular triangle normals layout",
            &[
                compute::storage_entry(0, true),
                compute::storage_entry(1, false),
                compute::params_entry(2),
            ],
        );
        let pipeline = ctx.compute_pipeline(
            "ocular triangle normals",
            include_str!("shaders/triangle_normals.wgsl"),
            &layout,
        );

        let triangles = (n / 3) as u32;
        let params = compute::params_buffer(
            ctx,
            "ocular triangle normals params",
            &NormalParams {
                triangles,
                _pad: [0; 3],
            },
        );
        let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ocular triangle normals"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: points },
                wgpu::BindGroupEntry { binding: 1, resource: normals },
                wgpu::BindGroupEntry { binding: 2, resource: params.as_entire_binding() },
            ],
        });

        let mut encoder = ctx.create_encoder("ocular compute normals");
        compute::dispatch(ctx, &mut encoder, "ocular triangle normals", &pipeline, &bind_group, triangles);
        ctx.submit(encoder);
        Ok(())
    }
}

/// One gather dispatch per attribute, all through the same faces.
struct Gather<'a> {
    ctx: &'a GpuContext,
    layout: &'a wgpu::BindGroupLayout,
    pipeline: &'a wgpu::ComputePipeline,
    faces: &'a GpuVector<[u32; 3]>,
    count: usize,
}

impl Gather<'_> {
    fn run<T: Pod>(&self, encoder: &mut wgpu::CommandEncoder, src: &GpuVector<T>) -> GpuVector<T> {
        let dst = GpuVector::with_len(src.context().clone(), self.count);

        // New buffers are zero-filled, which is what an empty source gathers to.
        let (Some(src_binding), Some(indices), Some(dst_binding)) =
            (src.binding(), self.faces.binding(), dst.binding())
        else {
            return dst;
        };

        let params = compute::params_buffer(
            self.ctx,
            "ocular gather params",
            &GatherParams {
                count: self.count as u32,
                width: (src.stride() / 4) as u32,
                src_len: src.len() as u32,
                _pad: 0,
            },
        );
        let bind_group = self.ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ocular gather"),
            layout: self.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src_binding },
                wgpu::BindGroupEntry { binding: 1, resource: indices },
                wgpu::BindGroupEntry { binding: 2, resource: dst_binding },
                wgpu::BindGroupEntry { binding: 3, resource: params.as_entire_binding() },
            ],
        });

        compute::dispatch(self.ctx, encoder, "ocular gather", self.pipeline, &bind_group, self.count as u32);
        dst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    const EPS: f32 = 1e-5;

    // ── host ──────────────────────────────────────────────────────────────

    #[test]
    fn cube_faces_point_outward() {
        let cube = Mesh::cube(2.0);
        assert_eq!(cube.points.len(), 8);
        assert_eq!(cube.faces.len(), 12);

        for [a, b, c] in &cube.faces {
            let (p0, p1, p2) = (cube.points[*a as usize], cube.points[*b as usize], cube.points[*c as usize]);
            let n = (p1 - p0).cross(p2 - p0);
            let center = (p0 + p1 + p2) / 3.0;
            assert!(n.dot(center) > 0.0, "face {a},{b},{c} points inward");
        }
    }

    // ── expand ────────────────────────────────────────────────────────────

    #[test]
    fn expand_gathers_points_and_matching_normals() {
        let Some(ctx) = testing::context() else { return };

        let mut host = Mesh::cube(1.0);
        host.normals = host.points.iter().map(|p| p.normalize()).collect();
        host.uvs = vec![Vec2::ZERO; 5];
        let mut mesh = GpuMesh::from_mesh(ctx, &host);

        mesh.expand_vertices().unwrap();

        assert_eq!(mesh.points().len(), 36);
        assert_eq!(mesh.faces().len(), 0);
        assert_eq!(mesh.normals().len(), 36);
        assert_eq!(mesh.uvs().len(), 0);

        let points = mesh.points().to_vec().unwrap();
        let normals = mesh.normals().to_vec().unwrap();
        for (i, face) in host.faces.iter().enumerate() {
            for (k, &idx) in face.iter().enumerate() {
                assert_eq!(points[3 * i + k], host.points[idx as usize]);
                assert_eq!(normals[3 * i + k], host.normals[idx as usize]);
            }
        }
    }

    #[test]
    fn expand_gathers_matching_uvs() {
        let Some(ctx) = testing::context() else { return };

        let mut host = Mesh::cube(1.0);
        host.uvs = (0..host.points.len()).map(|i| Vec2::new(i as f32, 0.5 * i as f32)).collect();
        host.normals = vec![Vec3::Z; 3];
        let mut mesh = GpuMesh::from_mesh(ctx, &host);

        mesh.expand_vertices().unwrap();

        assert_eq!(mesh.uvs().len(), 36);
        assert_eq!(mesh.normals().len(), 0);
        let uvs = mesh.uvs().to_vec().unwrap();
        for (i, face) in host.faces.iter().enumerate() {
            for (k, &idx) in face.iter().enumerate() {
                assert_eq!(uvs[3 * i + k], host.uvs[idx as usize]);
            }
        }
    }

    #[test]
    fn expand_without_faces_is_a_no_op() {
        let Some(ctx) = testing::context() else { return };
        let host = Mesh {
            points: vec![Vec3::X; 4],
            ..Mesh::default()
        };
        let mut mesh = GpuMesh::from_mesh(ctx, &host);
        let generation = mesh.points().generation();

        mesh.expand_vertices().unwrap();
        assert_eq!(mesh.points().len(), 4);
        assert_eq!(mesh.points().generation(), generation);
    }

    // ── normals ───────────────────────────────────────────────────────────

    #[test]
    fn compute_normals_rejects_partial_triangles() {
        let Some(ctx) = testing::context() else { return };
        let host = Mesh {
            points: vec![Vec3::X; 4],
            ..Mesh::default()
        };
        let mut mesh = GpuMesh::from_mesh(ctx, &host);

        let err = mesh.compute_normals().unwrap_err();
        assert!(matches!(err, Error::NotTriangleList(4)));
        assert!(mesh.normals().is_empty());
        assert_eq!(mesh.normals().capacity(), 0);
    }

    #[test]
    fn cube_normals_are_unit_face_normals() {
        let Some(ctx) = testing::context() else { return };
        let host = Mesh::cube(1.0);
        let mut mesh = GpuMesh::from_mesh(ctx, &host);

        mesh.compute_normals().unwrap();

        let points = mesh.points().to_vec().unwrap();
        let normals = mesh.normals().to_vec().unwrap();
        assert_eq!(normals.len(), 36);
        for t in 0..12 {
            let (p0, p1, p2) = (points[3 * t], points[3 * t + 1], points[3 * t + 2]);
            let expected = (p1 - p0).cross(p2 - p0).normalize();
            for k in 0..3 {
                assert!(normals[3 * t + k].abs_diff_eq(expected, EPS));
            }
        }
    }

    #[test]
    fn degenerate_triangle_gets_zero_normal() {
        let Some(ctx) = testing::context() else { return };
        let host = Mesh {
            points: vec![Vec3::X, Vec3::X * 2.0, Vec3::X * 3.0],
            ..Mesh::default()
        };
        let mut mesh = GpuMesh::from_mesh(ctx, &host);

        mesh.compute_normals().unwrap();
        assert_eq!(mesh.normals().to_vec().unwrap(), vec![Vec3::ZERO; 3]);
    }
}
