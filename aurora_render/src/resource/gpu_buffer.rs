/// Scoped GPU buffer and per-frame uniform buffers

use std::marker::PhantomData;
use std::sync::Arc;
use bytemuck::Pod;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, BufferDesc, GraphicsDevice};
use crate::memory::{AllocationId, SharedAllocator};

/// Buffer + allocation id, released on drop
pub struct GpuBuffer {
    buffer: Option<Arc<dyn Buffer>>,
    allocation: Option<AllocationId>,
    allocator: SharedAllocator,
    size: u64,
}

impl GpuBuffer {
    pub fn create(
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        desc: BufferDesc,
    ) -> Result<Self> {
        let allocation = allocator
            .lock()
            .map_err(|_| Error::BackendError("allocator lock poisoned".to_string()))?
            .allocate(desc.size, desc.memory)?;

        let mut buffer = Self {
            buffer: None,
            allocation: Some(allocation),
            allocator: allocator.clone(),
            size: desc.size,
        };
        buffer.buffer = Some(device.create_buffer(desc)?);
        Ok(buffer)
    }

    pub fn buffer(&self) -> Result<&Arc<dyn Buffer>> {
        self.buffer.as_ref().ok_or_else(|| Error::InvalidResource("buffer was destroyed".to_string()))
    }

    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.buffer()?.update(offset, data)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_created(&self) -> bool {
        self.buffer.is_some()
    }

    /// Release the allocation, then the buffer
    pub fn destroy(&mut self) {
        if let Some(id) = self.allocation.take() {
            if let Ok(mut allocator) = self.allocator.lock() {
                let _ = allocator.deallocate(id);
            }
        }
        self.buffer.take();
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// One host-visible uniform buffer of `T` per frame-in-flight slot
///
/// Slot `s` is only written after the fence of slot `s` has signaled, so the
/// GPU never reads a buffer while the CPU updates it.
pub struct PerFrameUniform<T: Pod> {
    buffers: Vec<GpuBuffer>,
    _marker: PhantomData<T>,
}

impl<T: Pod> PerFrameUniform<T> {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        allocator: &SharedAllocator,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let size = std::mem::size_of::<T>() as u64;
        let buffers = (0..frames_in_flight)
            .map(|_| GpuBuffer::create(device, allocator, BufferDesc::uniform(size)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { buffers, _marker: PhantomData })
    }

    pub fn write(&self, frame: usize, value: &T) -> Result<()> {
        self.slot(frame)?.write(0, bytemuck::bytes_of(value))
    }

    pub fn buffer(&self, frame: usize) -> Result<&Arc<dyn Buffer>> {
        self.slot(frame)?.buffer()
    }

    pub fn frames(&self) -> usize {
        self.buffers.len()
    }

    fn slot(&self, frame: usize) -> Result<&GpuBuffer> {
        self.buffers.get(frame).ok_or_else(|| {
            Error::InvalidResource(format!("frame slot {} out of {}", frame, self.buffers.len()))
        })
    }
}

#[cfg(test)]
#[path = "gpu_buffer_tests.rs"]
mod tests;
