use std::cell::Cell;
use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};

use crate::device::SharedContext;
use crate::error::{Error, Result};

use super::mapping::{ExternalMapping, HostMapping, MapState};

/// Usage flags of every vector buffer.
///
/// Vectors are bound as vertex, index and storage buffers interchangeably and
/// take part in buffer-to-buffer copies both ways.
pub(crate) const VECTOR_USAGES: wgpu::BufferUsages = wgpu::BufferUsages::VERTEX
    .union(wgpu::BufferUsages::INDEX)
    .union(wgpu::BufferUsages::STORAGE)
    .union(wgpu::BufferUsages::COPY_SRC)
    .union(wgpu::BufferUsages::COPY_DST);

/// Rounds a byte count up to the wgpu copy alignment (4 bytes).
#[inline]
pub(crate) fn copy_aligned(bytes: u64) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    bytes.div_ceil(align) * align
}

/// A typed, contiguous array living in a single GPU buffer.
///
/// The buffer is allocated lazily. It is reallocated (losing its contents)
/// only when a resize asks for more elements than the current capacity, and
/// is never shrunk.
///
/// Host access goes through scoped mappings ([`map`](Self::map),
/// [`map_external`](Self::map_external)). At most one mapping may be
/// outstanding, and a mapped vector is refused by draws and dispatches.
pub struct GpuVector<T: Pod> {
    ctx: SharedContext,
    label: &'static str,
    buffer: Option<wgpu::Buffer>,
    len: usize,
    capacity: usize,
    generation: u64,
    map_state: Cell<MapState>,
    _marker: PhantomData<T>,
}

impl<T: Pod> GpuVector<T> {
    /// Creates an empty vector. No GPU memory is allocated.
    pub fn new(ctx: SharedContext) -> Self {
        Self::labeled(ctx, "ocular vector")
    }

    /// Creates an empty vector whose buffers carry `label` in GPU debuggers.
    pub fn labeled(ctx: SharedContext, label: &'static str) -> Self {
        Self {
            ctx,
            label,
            buffer: None,
            len: 0,
            capacity: 0,
            generation: 0,
            map_state: Cell::new(MapState::Unmapped),
            _marker: PhantomData,
        }
    }

    /// Creates a vector of `len` uninitialized elements.
    pub fn with_len(ctx: SharedContext, len: usize) -> Self {
        let mut v = Self::new(ctx);
        v.resize(len);
        v
    }

    /// Creates a vector holding a copy of `data`.
    pub fn from_slice(ctx: SharedContext, data: &[T]) -> Self {
        let mut v = Self::new(ctx);
        v.set_data(data);
        v
    }

    /// Creates a vector holding a device-side copy of `other`.
    pub fn from_gpu(other: &GpuVector<T>) -> Result<Self> {
        let mut v = Self::labeled(other.ctx.clone(), other.label);
        v.copy_from(other)?;
        Ok(v)
    }

    pub fn context(&self) -> &SharedContext {
        &self.ctx
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the current allocation can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Byte size of one element.
    #[inline]
    pub fn stride(&self) -> usize {
        std::mem::size_of::<T>()
    }

    #[inline]
    pub fn byte_len(&self) -> u64 {
        (self.len * self.stride()) as u64
    }

    /// Counts buffer (re)allocations. Unchanged generation means the buffer
    /// handle, and therefore its contents, survived.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The underlying buffer, `None` while nothing is allocated.
    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    pub fn is_mapped(&self) -> bool {
        self.map_state.get() != MapState::Unmapped
    }

    /// Sets the element count to `len`.
    ///
    /// Within capacity this only changes the count; existing contents and the
    /// buffer handle are kept. Beyond capacity the buffer is reallocated to
    /// exactly `len` elements and previous contents are lost.
    pub fn resize(&mut self, len: usize) {
        if len > self.capacity {
            let size = copy_aligned((len * self.stride()) as u64);
            self.buffer = Some(self.ctx.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size,
                usage: VECTOR_USAGES,
                mapped_at_creation: false,
            }));
            self.capacity = len;
            self.generation += 1;
            log::debug!("{}: allocated {len} elements ({size} bytes)", self.label);
        }
        self.len = len;
    }

    /// Sets the element count to zero, keeping the allocation.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Replaces the contents with a copy of `data`.
    pub fn set_data(&mut self, data: &[T]) {
        self.resize(data.len());
        self.upload(data);
    }

    /// Replaces the contents with a device-side copy of `other`.
    pub fn copy_from(&mut self, other: &GpuVector<T>) -> Result<()> {
        other.ensure_unmapped()?;
        self.resize(other.len());

        let (Some(src), Some(dst)) = (other.buffer.as_ref(), self.buffer.as_ref()) else {
            return Ok(());
        };
        if other.is_empty() {
            return Ok(());
        }

        let mut encoder = self.ctx.create_encoder("ocular vector copy");
        encoder.copy_buffer_to_buffer(src, 0, dst, 0, copy_aligned(other.byte_len()));
        self.ctx.submit(encoder);
        Ok(())
    }

    /// Moves the buffer out into a new vector, leaving `self` empty and
    /// reusable.
    pub fn take(&mut self) -> Self {
        let taken = Self {
            ctx: self.ctx.clone(),
            label: self.label,
            buffer: self.buffer.take(),
            len: self.len,
            capacity: self.capacity,
            generation: self.generation,
            map_state: Cell::new(MapState::Unmapped),
            _marker: PhantomData,
        };
        self.len = 0;
        self.capacity = 0;
        taken
    }

    /// Maps the contents into host memory.
    ///
    /// Blocks until the GPU copy has completed. With `write`, the mapped
    /// contents are uploaded back when the guard drops. Fails with
    /// [`Error::AlreadyMapped`] while another mapping is outstanding.
    pub fn map(&self, write: bool) -> Result<HostMapping<'_, T>> {
        self.acquire(MapState::Host)?;
        let mut guard = HostMapping::new(self);
        guard.fill(self.read_back()?, write);
        Ok(guard)
    }

    /// Exposes the buffer to a compute pass recorded by the caller on the
    /// same device, without a host copy.
    ///
    /// Exclusive with host mappings.
    pub fn map_external(&self) -> Result<ExternalMapping<'_, T>> {
        self.acquire(MapState::External)?;
        Ok(ExternalMapping::new(self))
    }

    /// Reads the contents back into a new `Vec`.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.map(false)?.to_vec())
    }

    // ── crate helpers ──────────────────────────────────────────────────────

    pub(crate) fn ensure_unmapped(&self) -> Result<()> {
        if self.is_mapped() {
            return Err(Error::BufferMapped);
        }
        Ok(())
    }

    /// Vertex/index slice covering the live elements, `None` when empty.
    pub(crate) fn slice(&self) -> Option<wgpu::BufferSlice<'_>> {
        if self.is_empty() {
            return None;
        }
        self.buffer.as_ref().map(|b| b.slice(..self.byte_len()))
    }

    /// Storage binding covering the whole allocation, `None` when empty.
    pub(crate) fn binding(&self) -> Option<wgpu::BindingResource<'_>> {
        if self.is_empty() {
            return None;
        }
        self.buffer.as_ref().map(|b| b.as_entire_binding())
    }

    pub(crate) fn set_map_state(&self, state: MapState) {
        self.map_state.set(state);
    }

    pub(crate) fn upload(&self, data: &[T]) {
        let Some(buffer) = self.buffer.as_ref() else { return };
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.is_empty() {
            return;
        }

        let aligned = copy_aligned(bytes.len() as u64) as usize;
        if aligned == bytes.len() {
            self.ctx.queue().write_buffer(buffer, 0, bytes);
        } else {
            let mut padded = bytes.to_vec();
            padded.resize(aligned, 0);
            self.ctx.queue().write_buffer(buffer, 0, &padded);
        }
    }

    fn acquire(&self, state: MapState) -> Result<()> {
        if self.is_mapped() {
            return Err(Error::AlreadyMapped);
        }
        self.map_state.set(state);
        Ok(())
    }

    fn read_back(&self) -> Result<Vec<T>> {
        let Some(buffer) = self.buffer.as_ref() else { return Ok(Vec::new()) };
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let size = copy_aligned(self.byte_len());
        let staging = self.ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("ocular vector readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.ctx.create_encoder("ocular vector readback");
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.ctx.submit(encoder);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.ctx.wait_idle()?;
        rx.recv()
            .map_err(|e| Error::MapFailed(e.to_string()))?
            .map_err(|e| Error::MapFailed(e.to_string()))?;

        // Copy through a `Vec<T>` so the cast never depends on the alignment
        // of the mapped range.
        let mut out = vec![T::zeroed(); self.len];
        {
            let mapped = slice.get_mapped_range();
            let n = self.byte_len() as usize;
            bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(&mapped[..n]);
        }
        staging.unmap();

        Ok(out)
    }
}

impl<T: Pod> std::fmt::Debug for GpuVector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuVector")
            .field("label", &self.label)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("map_state", &self.map_state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::testing;

    #[test]
    fn copy_alignment_rounds_up_to_four_bytes() {
        assert_eq!(copy_aligned(0), 0);
        assert_eq!(copy_aligned(1), 4);
        assert_eq!(copy_aligned(12), 12);
        assert_eq!(copy_aligned(13), 16);
    }

    // ── allocation ────────────────────────────────────────────────────────

    #[test]
    fn new_vector_allocates_nothing() {
        let Some(ctx) = testing::context() else { return };
        let v = GpuVector::<f32>::new(ctx);
        assert!(v.buffer().is_none());
        assert_eq!(v.capacity(), 0);
        assert_eq!(v.generation(), 0);
    }

    #[test]
    fn shrinking_resize_keeps_buffer_and_capacity() {
        let Some(ctx) = testing::context() else { return };
        let mut v = GpuVector::<Vec3>::with_len(ctx, 64);
        let generation = v.generation();

        v.resize(10);
        assert_eq!(v.len(), 10);
        assert!(v.capacity() >= 64);
        assert_eq!(v.generation(), generation);

        v.resize(64);
        assert_eq!(v.generation(), generation);
    }

    #[test]
    fn growing_past_capacity_reallocates() {
        let Some(ctx) = testing::context() else { return };
        let mut v = GpuVector::<f32>::with_len(ctx, 4);
        let generation = v.generation();

        v.resize(5);
        assert_eq!(v.generation(), generation + 1);
        assert_eq!(v.capacity(), 5);
    }

    // ── contents ──────────────────────────────────────────────────────────

    #[test]
    fn resize_within_capacity_keeps_contents() {
        let Some(ctx) = testing::context() else { return };
        let mut v = GpuVector::from_slice(ctx, &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]);

        v.resize(3);
        assert_eq!(v.to_vec().unwrap(), vec![1.0, 2.0, 3.0]);

        v.resize(6);
        assert_eq!(v.to_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn float_triples_round_trip_bit_exact() {
        let Some(ctx) = testing::context() else { return };
        let points = vec![
            Vec3::new(0.1, -0.2, 0.3),
            Vec3::new(-3.25e7, f32::MIN_POSITIVE, 1.0 / 3.0),
            Vec3::new(f32::MAX, -0.0, 7.0),
        ];
        let v = GpuVector::from_slice(ctx, &points);

        let back = v.to_vec().unwrap();
        assert_eq!(back.len(), points.len());
        for (a, b) in points.iter().zip(&back) {
            assert_eq!(a.to_array().map(f32::to_bits), b.to_array().map(f32::to_bits));
        }
    }

    #[test]
    fn unaligned_byte_lengths_are_padded() {
        let Some(ctx) = testing::context() else { return };
        let v = GpuVector::from_slice(ctx, &[1u8, 2, 3, 4, 5]);
        assert_eq!(v.to_vec().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn write_mapping_is_uploaded_on_drop() {
        let Some(ctx) = testing::context() else { return };
        let v = GpuVector::from_slice(ctx, &[1.0f32, 2.0, 3.0]);
        {
            let mut m = v.map(true).unwrap();
            m[1] = 20.0;
        }
        assert_eq!(v.to_vec().unwrap(), vec![1.0, 20.0, 3.0]);
    }

    #[test]
    fn read_mapping_discards_host_writes() {
        let Some(ctx) = testing::context() else { return };
        let v = GpuVector::from_slice(ctx, &[1u32, 2]);
        {
            let mut m = v.map(false).unwrap();
            m[0] = 9;
        }
        assert_eq!(v.to_vec().unwrap(), vec![1, 2]);
    }

    #[test]
    fn device_copy_matches_source() {
        let Some(ctx) = testing::context() else { return };
        let src = GpuVector::from_slice(ctx, &[5u32, 6, 7]);
        let dst = GpuVector::from_gpu(&src).unwrap();
        assert_eq!(dst.to_vec().unwrap(), vec![5, 6, 7]);
    }

    // ── mapping exclusivity ───────────────────────────────────────────────

    #[test]
    fn second_mapping_fails_while_first_is_held() {
        let Some(ctx) = testing::context() else { return };
        let v = GpuVector::from_slice(ctx, &[1.0f32]);

        let first = v.map(false).unwrap();
        assert!(matches!(v.map(true), Err(Error::AlreadyMapped)));
        assert!(matches!(v.map_external(), Err(Error::AlreadyMapped)));
        drop(first);

        assert!(v.map(true).is_ok());
    }

    #[test]
    fn external_mapping_blocks_host_mapping_and_copies() {
        let Some(ctx) = testing::context() else { return };
        let v = GpuVector::from_slice(ctx, &[1.0f32, 2.0]);

        let ext = v.map_external().unwrap();
        assert!(ext.buffer().is_some());
        assert!(matches!(v.map(false), Err(Error::AlreadyMapped)));
        assert!(matches!(GpuVector::from_gpu(&v), Err(Error::BufferMapped)));
        drop(ext);

        assert!(!v.is_mapped());
    }

    // ── ownership ─────────────────────────────────────────────────────────

    #[test]
    fn take_leaves_source_empty_and_reusable() {
        let Some(ctx) = testing::context() else { return };
        let mut v = GpuVector::from_slice(ctx, &[1u32, 2, 3]);

        let moved = v.take();
        assert_eq!(moved.len(), 3);
        assert!(v.is_empty());
        assert!(v.buffer().is_none());

        v.set_data(&[4, 5]);
        assert_eq!(v.to_vec().unwrap(), vec![4, 5]);
        assert_eq!(moved.to_vec().unwrap(), vec![1, 2, 3]);
    }
}
