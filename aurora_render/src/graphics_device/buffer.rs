/// Buffer trait and buffer descriptor

use crate::error::Result;
use crate::memory::MemoryFlags;

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
    /// Uniform/constant buffer
    Uniform,
    /// Storage buffer
    Storage,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Memory properties the backing allocation must have
    pub memory: MemoryFlags,
}

impl BufferDesc {
    /// Host-visible, coherent uniform buffer of `size` bytes
    pub fn uniform(size: u64) -> Self {
        Self {
            size,
            usage: BufferUsage::Uniform,
            memory: MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_COHERENT,
        }
    }
}

/// GPU buffer
///
/// Backends release the native buffer and its memory when the last
/// reference is dropped.
pub trait Buffer: Send + Sync {
    /// Write `data` at `offset` (host-visible buffers only)
    ///
    /// # Arguments
    ///
    /// * `offset` - Byte offset into the buffer
    /// * `data` - Bytes to copy
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Size in bytes requested at creation
    fn size(&self) -> u64;
}
