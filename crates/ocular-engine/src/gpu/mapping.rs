use std::ops::{Deref, DerefMut};

use bytemuck::Pod;

use super::GpuVector;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum MapState {
    Unmapped,
    Host,
    External,
}

/// Host view of a [`GpuVector`]'s contents.
///
/// Created by [`GpuVector::map`]. The mapping is released when the guard
/// drops; a write mapping uploads its contents first.
pub struct HostMapping<'a, T: Pod> {
    vector: &'a GpuVector<T>,
    data: Vec<T>,
    write: bool,
}

impl<'a, T: Pod> HostMapping<'a, T> {
    pub(super) fn new(vector: &'a GpuVector<T>) -> Self {
        Self {
            vector,
            data: Vec::new(),
            write: false,
        }
    }

    pub(super) fn fill(&mut self, data: Vec<T>, write: bool) {
        self.data = data;
        self.write = write;
    }

    pub fn is_write(&self) -> bool {
        self.write
    }
}

impl<T: Pod> Deref for HostMapping<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T: Pod> DerefMut for HostMapping<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Pod> Drop for HostMapping<'_, T> {
    fn drop(&mut self) {
        if self.write {
            self.vector.upload(&self.data);
        }
        self.vector.set_map_state(MapState::Unmapped);
    }
}

/// Device-side access to a [`GpuVector`] for caller-recorded compute work.
///
/// Created by [`GpuVector::map_external`]. While held, the vector cannot be
/// host-mapped, drawn or used by the engine's own dispatches.
pub struct ExternalMapping<'a, T: Pod> {
    vector: &'a GpuVector<T>,
}

impl<'a, T: Pod> ExternalMapping<'a, T> {
    pub(super) fn new(vector: &'a GpuVector<T>) -> Self {
        Self { vector }
    }

    pub fn len(&self) -> usize {
        self.vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }

    pub fn buffer(&self) -> Option<&'a wgpu::Buffer> {
        self.vector.buffer()
    }

    /// Storage binding of the whole allocation, `None` when empty.
    pub fn binding(&self) -> Option<wgpu::BindingResource<'a>> {
        self.vector.binding()
    }
}

impl<T: Pod> Drop for ExternalMapping<'_, T> {
    fn drop(&mut self) {
        self.vector.set_map_state(MapState::Unmapped);
    }
}
