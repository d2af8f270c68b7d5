//! Typed, fixed-capacity buffers with scoped edits.
//!
//! A [`GpuBuffer<T>`] owns one buffer in the shared [`BufferState`] and views it
//! as an array of `T`. The only way to write to it is through an
//! [`EditRegion`], which stages elements on the host and uploads them as one
//! write when the region is closed, either explicitly with [`EditRegion::end`]
//! or implicitly when the guard is dropped.
//!
//! Element types should have a size that is a multiple of four bytes, since
//! device writes must be aligned to `wgpu::COPY_BUFFER_ALIGNMENT`.

use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Pod;

use super::{BufferError, BufferId, BufferKind, BufferState};
use crate::core::StSystem;

/// A fixed-capacity buffer of `T` registered in [`BufferState`].
///
/// The storage is released when the `GpuBuffer` is dropped.
pub struct GpuBuffer<T: Pod> {
    buffer_state: StSystem<BufferState>,
    id: BufferId,
    label: String,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> GpuBuffer<T> {
    /// Reserves storage for `capacity` elements.
    ///
    /// # Arguments
    /// * `buffer_state` - Registry the buffer is allocated in
    /// * `label` - Debug label, also used in error messages
    /// * `kind` - What the buffer is bound as
    /// * `capacity` - Number of elements; never changes afterwards
    /// * `initial` - Optional contents for the start of the buffer
    ///
    /// # Errors
    /// Propagates the [`BufferError`] from the backend if the allocation fails.
    pub fn allocate(
        buffer_state: &StSystem<BufferState>,
        label: &str,
        kind: BufferKind,
        capacity: usize,
        initial: Option<&[T]>,
    ) -> Result<Self, BufferError> {
        let size = (capacity * size_of::<T>()) as u64;
        let id = buffer_state.get_mut().create_buffer(
            label,
            kind,
            size,
            initial.map(bytemuck::cast_slice),
        )?;

        Ok(Self {
            buffer_state: buffer_state.clone(),
            id,
            label: label.to_string(),
            capacity,
            _marker: PhantomData,
        })
    }

    /// Registry id of the underlying buffer.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Debug label the buffer was allocated with.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Capacity in elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Capacity in bytes.
    pub fn byte_size(&self) -> u64 {
        (self.capacity * size_of::<T>()) as u64
    }

    /// Opens an edit region covering elements `offset..offset + count`.
    ///
    /// # Errors
    /// [`BufferError::RegionOutOfRange`] if the region does not fit in the buffer.
    pub fn begin_edit_region(
        &mut self,
        offset: usize,
        count: usize,
    ) -> Result<EditRegion<'_, T>, BufferError> {
        let end = offset.checked_add(count).unwrap_or(usize::MAX);
        if end > self.capacity {
            return Err(BufferError::RegionOutOfRange {
                label: self.label.clone(),
                offset,
                end,
                capacity: self.capacity,
            });
        }

        Ok(EditRegion {
            buffer: self,
            offset,
            count,
            staged: Vec::new(),
            closed: false,
        })
    }

    /// Copies the buffer contents back out of host memory.
    ///
    /// Returns `None` when the buffer lives on a device.
    pub fn read_back(&self) -> Option<Vec<T>> {
        let state = self.buffer_state.get();
        let bytes = state.read_host(self.id)?;
        Some(
            bytes
                .chunks_exact(size_of::<T>())
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        )
    }
}

impl<T: Pod> Drop for GpuBuffer<T> {
    fn drop(&mut self) {
        match self.buffer_state.try_get_mut() {
            Ok(mut state) => {
                state.release(self.id);
            }
            Err(_) => log::warn!(
                "Buffer '{}' could not be released: buffer state is borrowed",
                self.label
            ),
        }
    }
}

/// A scoped write into a [`GpuBuffer`].
///
/// Elements are staged in order from the start of the region. Closing the
/// region uploads the staged prefix in a single write; elements of the region
/// that were never staged keep their previous contents.
///
/// # Examples
///
/// ```
/// use voxel_chunk_engine::core::StSystem;
/// use voxel_chunk_engine::engine_state::buffer_state::{BufferKind, BufferState, GpuBuffer};
///
/// let state = StSystem::new(Box::new(BufferState::headless(1024)));
/// let mut buffer = GpuBuffer::<u32>::allocate(&state, "demo", BufferKind::Vertex, 8, None).unwrap();
///
/// let mut region = buffer.begin_edit_region(2, 4).unwrap();
/// region.push(7).unwrap();
/// region.extend_from_slice(&[8, 9]).unwrap();
/// assert_eq!(region.end().unwrap(), 3);
///
/// assert_eq!(buffer.read_back().unwrap(), vec![0, 0, 7, 8, 9, 0, 0, 0]);
/// ```
pub struct EditRegion<'a, T: Pod> {
    buffer: &'a mut GpuBuffer<T>,
    offset: usize,
    count: usize,
    staged: Vec<T>,
    closed: bool,
}

impl<T: Pod> EditRegion<'_, T> {
    /// Number of elements staged so far.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Returns `true` if nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Room left in the region, in elements.
    pub fn remaining(&self) -> usize {
        self.count - self.staged.len()
    }

    /// Appends one element.
    pub fn push(&mut self, value: T) -> Result<(), BufferError> {
        if self.staged.len() == self.count {
            return Err(self.overflow());
        }
        self.staged.push(value);
        Ok(())
    }

    /// Appends a run of elements. Nothing is staged if they do not all fit.
    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<(), BufferError> {
        if values.len() > self.remaining() {
            return Err(self.overflow());
        }
        self.staged.extend_from_slice(values);
        Ok(())
    }

    /// Writes `data` at `offset` elements from the start of the region.
    ///
    /// Staged elements are overwritten in place; a gap between the staged
    /// prefix and `offset` is filled with zeroed elements.
    pub fn edit_region(&mut self, offset: usize, data: &[T]) -> Result<(), BufferError> {
        let end = offset + data.len();
        if end > self.count {
            return Err(self.overflow());
        }
        if self.staged.len() < end {
            self.staged.resize(end, T::zeroed());
        }
        self.staged[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Closes the region, uploading what was staged.
    ///
    /// # Returns
    /// The number of elements written.
    pub fn end(mut self) -> Result<usize, BufferError> {
        self.flush()
    }

    fn flush(&mut self) -> Result<usize, BufferError> {
        self.closed = true;
        let written = self.staged.len();
        if written == 0 {
            return Ok(0);
        }

        let byte_offset = (self.offset * size_of::<T>()) as u64;
        self.buffer.buffer_state.get_mut().write_buffer(
            self.buffer.id,
            byte_offset,
            bytemuck::cast_slice(&self.staged),
        )?;
        Ok(written)
    }

    fn overflow(&self) -> BufferError {
        BufferError::RegionOverflow {
            label: self.buffer.label.clone(),
            count: self.count,
        }
    }
}

impl<T: Pod> Drop for EditRegion<'_, T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(error) = self.flush() {
            log::error!(
                "Failed to flush edit region of buffer '{}': {error}",
                self.buffer.label
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headless_state() -> StSystem<BufferState> {
        StSystem::new(Box::new(BufferState::headless(4096)))
    }

    #[test]
    fn regions_outside_capacity_are_refused() {
        let state = headless_state();
        let mut buffer = GpuBuffer::<u32>::allocate(&state, "v", BufferKind::Vertex, 4, None).unwrap();

        assert!(matches!(
            buffer.begin_edit_region(2, 3),
            Err(BufferError::RegionOutOfRange { offset: 2, end: 5, capacity: 4, .. })
        ));
        assert!(buffer.begin_edit_region(usize::MAX, 2).is_err());
        assert!(buffer.begin_edit_region(0, 4).is_ok());
    }

    #[test]
    fn pushing_past_the_region_overflows() {
        let state = headless_state();
        let mut buffer = GpuBuffer::<u32>::allocate(&state, "v", BufferKind::Vertex, 8, None).unwrap();

        let mut region = buffer.begin_edit_region(0, 2).unwrap();
        region.push(1).unwrap();
        region.push(2).unwrap();
        assert!(matches!(region.push(3), Err(BufferError::RegionOverflow { count: 2, .. })));
        assert!(region.extend_from_slice(&[4]).is_err());
        assert_eq!(region.end().unwrap(), 2);

        assert_eq!(&buffer.read_back().unwrap()[..3], &[1, 2, 0]);
    }

    #[test]
    fn dropped_region_still_flushes() {
        fn fill(buffer: &mut GpuBuffer<u32>) -> Result<(), BufferError> {
            let mut region = buffer.begin_edit_region(1, 3)?;
            region.push(5)?;
            region.push(6)?;
            region.push(7)?;
            region.push(8)?;
            Ok(())
        }

        let state = headless_state();
        let mut buffer = GpuBuffer::<u32>::allocate(&state, "v", BufferKind::Vertex, 5, None).unwrap();

        assert!(fill(&mut buffer).is_err());
        assert_eq!(buffer.read_back().unwrap(), vec![0, 5, 6, 7, 0]);
        assert_eq!(state.get().times_written(buffer.id()), Some(1));
    }

    #[test]
    fn edit_region_fills_gaps_with_zeroes() {
        let state = headless_state();
        let mut buffer =
            GpuBuffer::<u32>::allocate(&state, "v", BufferKind::Vertex, 6, Some(&[9; 6])).unwrap();

        let mut region = buffer.begin_edit_region(0, 6).unwrap();
        region.push(1).unwrap();
        region.edit_region(3, &[4, 4]).unwrap();
        region.edit_region(0, &[2]).unwrap();
        assert!(region.edit_region(5, &[1, 1]).is_err());
        assert_eq!(region.end().unwrap(), 5);

        assert_eq!(buffer.read_back().unwrap(), vec![2, 0, 0, 4, 4, 9]);
    }

    #[test]
    fn empty_region_does_not_write() {
        let state = headless_state();
        let mut buffer = GpuBuffer::<u32>::allocate(&state, "v", BufferKind::Vertex, 2, None).unwrap();

        let region = buffer.begin_edit_region(0, 2).unwrap();
        assert_eq!(region.end().unwrap(), 0);
        assert_eq!(state.get().times_written(buffer.id()), Some(0));
    }

    #[test]
    fn dropping_the_buffer_releases_storage() {
        let state = headless_state();
        let buffer = GpuBuffer::<u32>::allocate(&state, "v", BufferKind::Vertex, 16, None).unwrap();
        assert_eq!(state.get().get_total_allocated_memory(), 64);

        drop(buffer);
        assert_eq!(state.get().buffer_count(), 0);
    }
}
