//! # Buffer State Module
//!
//! This module provides a centralized registry for every GPU buffer the engine
//! allocates: chunk vertex buffers, indirect command buffers, uniforms, and the
//! shared quad index buffer.
//!
//! ## Key Features
//!
//! * Centralized buffer management keyed by [`BufferId`]
//! * Buffer usage analytics and memory tracking
//! * Bounds-checked writes
//! * Two interchangeable backends: a wgpu device, or host memory for headless runs
//!
//! ## Architecture
//!
//! `BufferState` is shared as an `StSystem<BufferState>` between the world, each
//! chunk's [`GpuBuffer`]s and the renderer.
//! Storage is fixed at allocation time; nothing is ever resized. A chunk sizes
//! its buffers for the worst case up front, so allocation happens when the
//! chunk loads and never during an edit.
//!
//! The host backend keeps buffer contents in plain `Vec<u8>`s. It exists so the
//! meshing path can run (and be tested) without an adapter, and it is the only
//! backend that supports reading contents back.

use std::collections::HashMap;

use thiserror::Error;
use wgpu::{Device, Queue};

use crate::core::StSystem;

pub mod gpu_buffer;

pub use gpu_buffer::{EditRegion, GpuBuffer};

/// Opaque identifier of a buffer registered in [`BufferState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Packed chunk vertices
    Vertex,
    /// Shared quad indices
    Index,
    /// Indirect draw commands
    Indirect,
    /// Small uniform blocks (camera, chunk origin)
    Uniform,
}

impl BufferKind {
    /// The wgpu usage flags a buffer of this kind is created with.
    pub fn usages(self) -> wgpu::BufferUsages {
        let usage = match self {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Indirect => wgpu::BufferUsages::INDIRECT,
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
        };
        usage | wgpu::BufferUsages::COPY_DST
    }
}

/// Errors raised by buffer allocation and writes.
///
/// Allocation failures are fatal for the caller: nothing in the engine retries
/// them, they propagate up to the top level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The backend refused the allocation
    #[error("failed to allocate buffer '{label}' ({size} bytes): {reason}")]
    Allocation {
        /// Buffer label
        label: String,
        /// Requested size in bytes
        size: u64,
        /// Backend diagnostic
        reason: String,
    },
    /// The requested size exceeds what the backend can allocate at once
    #[error("buffer '{label}' needs {size} bytes but the backend limit is {limit}")]
    TooLarge {
        /// Buffer label
        label: String,
        /// Requested size in bytes
        size: u64,
        /// Backend maximum in bytes
        limit: u64,
    },
    /// The id does not name a live buffer
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),
    /// A write would run past the end of the buffer
    #[error("write of {len} bytes at offset {offset} exceeds buffer '{label}' of {size} bytes")]
    OutOfBounds {
        /// Buffer label
        label: String,
        /// Byte offset of the write
        offset: u64,
        /// Length of the write in bytes
        len: u64,
        /// Buffer size in bytes
        size: u64,
    },
    /// An edit region does not fit inside the buffer
    #[error("edit region {offset}..{end} exceeds capacity {capacity} of buffer '{label}'")]
    RegionOutOfRange {
        /// Buffer label
        label: String,
        /// First element of the region
        offset: usize,
        /// One past the last element of the region
        end: usize,
        /// Buffer capacity in elements
        capacity: usize,
    },
    /// More elements were pushed than the edit region was opened for
    #[error("edit region of {count} elements in buffer '{label}' is full")]
    RegionOverflow {
        /// Buffer label
        label: String,
        /// Region length in elements
        count: usize,
    },
}

/// Where buffer storage lives.
pub enum BufferBackend {
    /// Real device memory
    Device {
        /// Device used to allocate buffers
        device: StSystem<Device>,
        /// Queue used to upload writes
        queue: StSystem<Queue>,
    },
    /// Host memory, for headless runs and tests
    Host {
        /// Largest single allocation accepted, in bytes
        max_buffer_size: u64,
    },
}

enum BufferStorage {
    Device(wgpu::Buffer),
    Host(Vec<u8>),
}

/// Analytics data for a buffer
#[derive(Debug)]
struct BufferAnalytics {
    /// Debug label
    label: String,
    /// Total memory allocated for the buffer in bytes
    allocated_memory: u64,
    /// High-water mark of bytes written
    used_memory: u64,
    /// Number of times the buffer has been written to
    times_written: u64,
}

/// Central manager for GPU buffers
///
/// # Examples
///
/// ```
/// use voxel_chunk_engine::engine_state::buffer_state::{BufferKind, BufferState};
///
/// let mut buffer_state = BufferState::headless(1024);
/// let id = buffer_state
///     .create_buffer("uniform", BufferKind::Uniform, 16, None)
///     .unwrap();
/// buffer_state.write_buffer(id, 0, &[1, 2, 3, 4]).unwrap();
///
/// assert_eq!(&buffer_state.read_host(id).unwrap()[..4], &[1, 2, 3, 4]);
/// assert_eq!(buffer_state.get_total_used_memory(), 4);
/// ```
pub struct BufferState {
    backend: BufferBackend,
    buffers: HashMap<BufferId, BufferStorage>,
    buffer_analytics: HashMap<BufferId, BufferAnalytics>,
    next_id: u64,
}

impl BufferState {
    /// Creates a buffer registry backed by a wgpu device.
    pub fn new(device: StSystem<Device>, queue: StSystem<Queue>) -> Self {
        Self::with_backend(BufferBackend::Device { device, queue })
    }

    /// Creates a buffer registry backed by host memory.
    ///
    /// # Arguments
    ///
    /// * `max_buffer_size` - Largest allocation accepted, mirroring a device's
    ///   `max_buffer_size` limit
    pub fn headless(max_buffer_size: u64) -> Self {
        Self::with_backend(BufferBackend::Host { max_buffer_size })
    }

    fn with_backend(backend: BufferBackend) -> Self {
        Self {
            backend,
            buffers: HashMap::new(),
            buffer_analytics: HashMap::new(),
            next_id: 0,
        }
    }

    /// Returns `true` when buffers live in host memory.
    pub fn is_headless(&self) -> bool {
        matches!(self.backend, BufferBackend::Host { .. })
    }

    /// The device buffers are allocated on, if any.
    pub fn device(&self) -> Option<&StSystem<Device>> {
        match &self.backend {
            BufferBackend::Device { device, .. } => Some(device),
            BufferBackend::Host { .. } => None,
        }
    }

    /// The queue writes are uploaded through, if any.
    pub fn queue(&self) -> Option<&StSystem<Queue>> {
        match &self.backend {
            BufferBackend::Device { queue, .. } => Some(queue),
            BufferBackend::Host { .. } => None,
        }
    }

    /// Allocates a fixed-size buffer, optionally filling its start with `contents`.
    ///
    /// # Errors
    ///
    /// * [`BufferError::TooLarge`] if `size` exceeds the backend limit
    /// * [`BufferError::OutOfBounds`] if `contents` is longer than `size`
    /// * [`BufferError::Allocation`] if the device reports an error while
    ///   creating the buffer
    pub fn create_buffer(
        &mut self,
        label: &str,
        kind: BufferKind,
        size: u64,
        contents: Option<&[u8]>,
    ) -> Result<BufferId, BufferError> {
        let initial_len = contents.map_or(0, |c| c.len() as u64);
        if initial_len > size {
            return Err(BufferError::OutOfBounds {
                label: label.to_string(),
                offset: 0,
                len: initial_len,
                size,
            });
        }

        let storage = match &self.backend {
            BufferBackend::Device { device, queue } => {
                let device = device.get();
                let limit = device.limits().max_buffer_size;
                if size > limit {
                    return Err(BufferError::TooLarge {
                        label: label.to_string(),
                        size,
                        limit,
                    });
                }

                device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
                device.push_error_scope(wgpu::ErrorFilter::Validation);
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size,
                    usage: kind.usages(),
                    mapped_at_creation: false,
                });
                let validation = pollster::block_on(device.pop_error_scope());
                let out_of_memory = pollster::block_on(device.pop_error_scope());
                if let Some(error) = out_of_memory.or(validation) {
                    return Err(BufferError::Allocation {
                        label: label.to_string(),
                        size,
                        reason: error.to_string(),
                    });
                }

                if let Some(contents) = contents.filter(|c| !c.is_empty()) {
                    queue.get().write_buffer(&buffer, 0, contents);
                }
                BufferStorage::Device(buffer)
            }
            BufferBackend::Host { max_buffer_size } => {
                if size > *max_buffer_size {
                    return Err(BufferError::TooLarge {
                        label: label.to_string(),
                        size,
                        limit: *max_buffer_size,
                    });
                }
                let mut bytes = vec![0u8; size as usize];
                if let Some(contents) = contents {
                    bytes[..contents.len()].copy_from_slice(contents);
                }
                BufferStorage::Host(bytes)
            }
        };

        let id = BufferId(self.next_id);
        self.next_id += 1;

        self.buffers.insert(id, storage);
        self.buffer_analytics.insert(
            id,
            BufferAnalytics {
                label: label.to_string(),
                allocated_memory: size,
                used_memory: initial_len,
                times_written: u64::from(initial_len > 0),
            },
        );

        Ok(id)
    }

    /// Writes raw bytes into a buffer.
    ///
    /// # Errors
    ///
    /// * [`BufferError::UnknownBuffer`] if `id` was released or never existed
    /// * [`BufferError::OutOfBounds`] if the write would exceed the buffer
    pub fn write_buffer(
        &mut self,
        id: BufferId,
        offset: wgpu::BufferAddress,
        data: &[u8],
    ) -> Result<(), BufferError> {
        let buffer_analytics = self
            .buffer_analytics
            .get_mut(&id)
            .ok_or(BufferError::UnknownBuffer(id))?;

        let buffer_size = buffer_analytics.allocated_memory;
        let data_size = data.len() as u64;

        if offset + data_size > buffer_size {
            return Err(BufferError::OutOfBounds {
                label: buffer_analytics.label.clone(),
                offset,
                len: data_size,
                size: buffer_size,
            });
        }

        match self.buffers.get_mut(&id) {
            Some(BufferStorage::Device(buffer)) => {
                if let BufferBackend::Device { queue, .. } = &self.backend {
                    queue.get().write_buffer(buffer, offset, data);
                }
            }
            Some(BufferStorage::Host(bytes)) => {
                let start = offset as usize;
                bytes[start..start + data.len()].copy_from_slice(data);
            }
            None => return Err(BufferError::UnknownBuffer(id)),
        }

        buffer_analytics.used_memory = buffer_analytics.used_memory.max(offset + data_size);
        buffer_analytics.times_written += 1;
        Ok(())
    }

    /// Frees a buffer. Returns `false` if it was not registered.
    pub fn release(&mut self, id: BufferId) -> bool {
        self.buffer_analytics.remove(&id);
        match self.buffers.remove(&id) {
            Some(BufferStorage::Device(buffer)) => {
                buffer.destroy();
                true
            }
            Some(BufferStorage::Host(_)) => true,
            None => false,
        }
    }

    /// Gets the device buffer behind `id`.
    ///
    /// Returns `None` for unknown ids and for host-backed buffers.
    pub fn get_buffer(&self, id: BufferId) -> Option<&wgpu::Buffer> {
        match self.buffers.get(&id) {
            Some(BufferStorage::Device(buffer)) => Some(buffer),
            _ => None,
        }
    }

    /// Reads back the full contents of a host-backed buffer.
    ///
    /// Returns `None` for unknown ids and for device-backed buffers.
    pub fn read_host(&self, id: BufferId) -> Option<&[u8]> {
        match self.buffers.get(&id) {
            Some(BufferStorage::Host(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Allocated size of a buffer in bytes.
    pub fn buffer_size(&self, id: BufferId) -> Option<u64> {
        self.buffer_analytics
            .get(&id)
            .map(|analytics| analytics.allocated_memory)
    }

    /// Number of times a buffer has been written.
    pub fn times_written(&self, id: BufferId) -> Option<u64> {
        self.buffer_analytics
            .get(&id)
            .map(|analytics| analytics.times_written)
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Gets the total allocated memory across all buffers
    pub fn get_total_allocated_memory(&self) -> u64 {
        self.buffer_analytics
            .values()
            .fold(0, |acc, buffer_analytics| {
                acc + buffer_analytics.allocated_memory
            })
    }

    /// Gets the total used memory across all buffers
    pub fn get_total_used_memory(&self) -> u64 {
        self.buffer_analytics
            .values()
            .fold(0, |acc, buffer_analytics| acc + buffer_analytics.used_memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_buffers_start_zeroed_with_initial_prefix() {
        let mut state = BufferState::headless(64);
        let id = state
            .create_buffer("init", BufferKind::Vertex, 8, Some(&[9, 9]))
            .unwrap();

        assert_eq!(state.read_host(id).unwrap(), &[9, 9, 0, 0, 0, 0, 0, 0]);
        assert_eq!(state.times_written(id), Some(1));
    }

    #[test]
    fn allocation_over_the_limit_fails() {
        let mut state = BufferState::headless(16);
        let err = state
            .create_buffer("big", BufferKind::Vertex, 17, None)
            .unwrap_err();

        assert!(matches!(err, BufferError::TooLarge { size: 17, limit: 16, .. }));
        assert_eq!(state.buffer_count(), 0);
    }

    #[test]
    fn writes_past_the_end_are_rejected() {
        let mut state = BufferState::headless(64);
        let id = state
            .create_buffer("small", BufferKind::Indirect, 8, None)
            .unwrap();

        let err = state.write_buffer(id, 6, &[0; 4]).unwrap_err();
        assert!(matches!(err, BufferError::OutOfBounds { offset: 6, len: 4, size: 8, .. }));
        assert_eq!(state.read_host(id).unwrap(), &[0; 8]);
    }

    #[test]
    fn analytics_track_high_water_mark() {
        let mut state = BufferState::headless(1024);
        let a = state.create_buffer("a", BufferKind::Vertex, 100, None).unwrap();
        let b = state.create_buffer("b", BufferKind::Uniform, 16, None).unwrap();

        state.write_buffer(a, 40, &[1; 20]).unwrap();
        state.write_buffer(a, 0, &[1; 4]).unwrap();
        state.write_buffer(b, 0, &[1; 16]).unwrap();

        assert_eq!(state.get_total_allocated_memory(), 116);
        assert_eq!(state.get_total_used_memory(), 76);
        assert_eq!(state.times_written(a), Some(2));
    }

    #[test]
    fn released_buffers_are_forgotten() {
        let mut state = BufferState::headless(64);
        let id = state.create_buffer("gone", BufferKind::Index, 4, None).unwrap();

        assert!(state.release(id));
        assert!(!state.release(id));
        assert_eq!(state.write_buffer(id, 0, &[1]), Err(BufferError::UnknownBuffer(id)));
        assert_eq!(state.get_total_allocated_memory(), 0);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut state = BufferState::headless(64);
        let first = state.create_buffer("a", BufferKind::Index, 4, None).unwrap();
        state.release(first);
        let second = state.create_buffer("b", BufferKind::Index, 4, None).unwrap();

        assert_ne!(first, second);
    }
}
