/// Resource allocator - tracks GPU memory sub-allocations by opaque id
///
/// Memory is reserved in large blocks per memory-property combination and
/// handed out with an alignment-respecting first-fit search. Freed ranges are
/// merged with their neighbours so that blocks do not fragment over repeated
/// resize cycles. Allocations bigger than a block get a dedicated block that is
/// released together with the allocation.
///
/// Ids are versioned slot-map keys: a freed id is never handed out again while
/// a newer allocation occupies its slot.

use std::sync::{Arc, Mutex};
use slotmap::{new_key_type, SlotMap};
use crate::error::{Error, Result};
use crate::{engine_error, engine_info};

new_key_type! {
    /// Opaque allocation handle
    pub struct AllocationId;
}

bitflags::bitflags! {
    /// Memory property flags an allocation must satisfy
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryFlags: u32 {
        const DEVICE_LOCAL = 1 << 0;
        const HOST_VISIBLE = 1 << 1;
        const HOST_COHERENT = 1 << 2;
    }
}

/// Default size of a memory block (64 MiB)
pub const DEFAULT_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Alignment of every sub-allocation
pub const DEFAULT_ALIGNMENT: u64 = 256;

/// Allocator shared between the orchestrator and the GPU resource wrappers
///
/// The mutex is the serialization point for allocate/deallocate.
pub type SharedAllocator = Arc<Mutex<ResourceAllocator>>;

/// None when rounding up overflows
fn align_up(value: u64, alignment: u64) -> Option<u64> {
    Some(value.checked_add(alignment - 1)? / alignment * alignment)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FreeRange {
    offset: u64,
    size: u64,
}

#[derive(Debug)]
struct MemoryBlock {
    flags: MemoryFlags,
    size: u64,
    /// Sorted by offset, never adjacent (adjacent ranges are merged)
    free: Vec<FreeRange>,
    dedicated: bool,
    live: usize,
}

impl MemoryBlock {
    fn new(flags: MemoryFlags, size: u64, dedicated: bool) -> Self {
        Self {
            flags,
            size,
            free: vec![FreeRange { offset: 0, size }],
            dedicated,
            live: 0,
        }
    }

    fn used(&self) -> u64 {
        self.size - self.free.iter().map(|r| r.size).sum::<u64>()
    }

    /// First fit; returns the offset of the carved range
    fn carve(&mut self, size: u64, alignment: u64) -> Option<u64> {
        let index = self.free.iter().position(|range| {
            align_up(range.offset, alignment)
                .and_then(|start| start.checked_add(size))
                .is_some_and(|end| end <= range.offset + range.size)
        })?;

        let range = self.free[index];
        let start = align_up(range.offset, alignment)?;
        let end = start + size;
        let mut replacement = Vec::with_capacity(2);
        if start > range.offset {
            replacement.push(FreeRange { offset: range.offset, size: start - range.offset });
        }
        if end < range.offset + range.size {
            replacement.push(FreeRange { offset: end, size: range.offset + range.size - end });
        }
        self.free.splice(index..=index, replacement);
        self.live += 1;
        Some(start)
    }

    /// Return a range, merging it with adjacent free ranges
    fn release(&mut self, offset: u64, size: u64) {
        let index = self.free.partition_point(|r| r.offset < offset);
        self.free.insert(index, FreeRange { offset, size });

        if index + 1 < self.free.len() {
            let next = self.free[index + 1];
            if self.free[index].offset + self.free[index].size == next.offset {
                self.free[index].size += next.size;
                self.free.remove(index + 1);
            }
        }
        if index > 0 {
            let current = self.free[index];
            let previous = &mut self.free[index - 1];
            if previous.offset + previous.size == current.offset {
                previous.size += current.size;
                self.free.remove(index);
            }
        }
        self.live -= 1;
    }
}

#[derive(Debug, Clone, Copy)]
struct Allocation {
    block: usize,
    offset: u64,
    size: u64,
}

/// Usage of one memory block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockReport {
    pub flags: MemoryFlags,
    pub size: u64,
    pub used: u64,
    pub allocations: usize,
    pub free_ranges: usize,
    pub dedicated: bool,
}

/// Snapshot of the allocator state for diagnostics
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemoryReport {
    pub blocks: Vec<BlockReport>,
    pub live_allocations: usize,
    pub reserved_bytes: u64,
    pub used_bytes: u64,
}

impl MemoryReport {
    /// Bytes in use per memory-property combination
    pub fn used_by_flags(&self, flags: MemoryFlags) -> u64 {
        self.blocks.iter().filter(|b| b.flags == flags).map(|b| b.used).sum()
    }
}

/// Resource allocator
pub struct ResourceAllocator {
    block_size: u64,
    alignment: u64,
    /// Total bytes that may be reserved (None = unlimited)
    budget: Option<u64>,
    blocks: Vec<Option<MemoryBlock>>,
    allocations: SlotMap<AllocationId, Allocation>,
}

impl ResourceAllocator {
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(block_size: u64) -> Self {
        Self {
            block_size,
            alignment: DEFAULT_ALIGNMENT,
            budget: None,
            blocks: Vec::new(),
            allocations: SlotMap::with_key(),
        }
    }

    /// Fail with `OutOfMemory` once reserving another block would exceed `bytes`
    pub fn with_budget(mut self, bytes: u64) -> Self {
        self.budget = Some(bytes);
        self
    }

    /// Wrap in the shared handle
    pub fn shared(self) -> SharedAllocator {
        Arc::new(Mutex::new(self))
    }

    fn reserved(&self) -> u64 {
        self.blocks.iter().flatten().map(|b| b.size).sum()
    }

    fn reserve_block(&mut self, flags: MemoryFlags, size: u64, dedicated: bool) -> Result<usize> {
        if let Some(budget) = self.budget {
            if self.reserved() + size > budget {
                return Err(Error::OutOfMemory);
            }
        }
        let block = MemoryBlock::new(flags, size, dedicated);
        match self.blocks.iter().position(|b| b.is_none()) {
            Some(index) => {
                self.blocks[index] = Some(block);
                Ok(index)
            }
            None => {
                self.blocks.push(Some(block));
                Ok(self.blocks.len() - 1)
            }
        }
    }

    /// Reserve `size` bytes of memory with the given properties
    pub fn allocate(&mut self, size: u64, flags: MemoryFlags) -> Result<AllocationId> {
        if size == 0 {
            return Err(Error::InvalidResource("zero-sized allocation".to_string()));
        }
        let alignment = self.alignment;
        let size = align_up(size, alignment).ok_or(Error::OutOfMemory)?;

        if size > self.block_size {
            let block = self.reserve_block(flags, size, true)?;
            let offset = self.blocks[block]
                .as_mut()
                .and_then(|b| b.carve(size, alignment))
                .ok_or(Error::OutOfMemory)?;
            return Ok(self.allocations.insert(Allocation { block, offset, size }));
        }

        for (index, slot) in self.blocks.iter_mut().enumerate() {
            if let Some(block) = slot {
                if block.flags != flags || block.dedicated {
                    continue;
                }
                if let Some(offset) = block.carve(size, alignment) {
                    return Ok(self.allocations.insert(Allocation { block: index, offset, size }));
                }
            }
        }

        let block = self.reserve_block(flags, self.block_size, false)?;
        let offset = self.blocks[block]
            .as_mut()
            .and_then(|b| b.carve(size, alignment))
            .ok_or(Error::OutOfMemory)?;
        Ok(self.allocations.insert(Allocation { block, offset, size }))
    }

    /// Release an allocation
    ///
    /// An unknown or already-released id is reported and returns
    /// `ResourceNotFound`; callers on idempotent destroy paths may ignore it.
    pub fn deallocate(&mut self, id: AllocationId) -> Result<()> {
        let Some(allocation) = self.allocations.remove(id) else {
            engine_error!("aurora::ResourceAllocator", "deallocate: unknown allocation {:?}", id);
            return Err(Error::ResourceNotFound(format!("allocation {:?}", id)));
        };

        let slot = &mut self.blocks[allocation.block];
        if let Some(block) = slot {
            block.release(allocation.offset, allocation.size);
            if block.dedicated && block.live == 0 {
                *slot = None;
            }
        }
        Ok(())
    }

    /// Whether `id` names a live allocation
    pub fn is_live(&self, id: AllocationId) -> bool {
        self.allocations.contains_key(id)
    }

    /// Offset and aligned size of a live allocation
    pub fn range(&self, id: AllocationId) -> Option<(u64, u64)> {
        self.allocations.get(id).map(|a| (a.offset, a.size))
    }

    pub fn live_count(&self) -> usize {
        self.allocations.len()
    }

    /// Drop every allocation and block, returning how many allocations were live
    pub fn release_all(&mut self) -> usize {
        let released = self.allocations.len();
        self.allocations.clear();
        self.blocks.clear();
        released
    }

    pub fn report(&self) -> MemoryReport {
        let blocks: Vec<BlockReport> = self.blocks
            .iter()
            .flatten()
            .map(|b| BlockReport {
                flags: b.flags,
                size: b.size,
                used: b.used(),
                allocations: b.live,
                free_ranges: b.free.len(),
                dedicated: b.dedicated,
            })
            .collect();
        MemoryReport {
            live_allocations: self.allocations.len(),
            reserved_bytes: blocks.iter().map(|b| b.size).sum(),
            used_bytes: blocks.iter().map(|b| b.used).sum(),
            blocks,
        }
    }

    /// Log the report at Info level
    pub fn log_report(&self) {
        let report = self.report();
        engine_info!("aurora::ResourceAllocator",
            "{} live allocations, {} / {} bytes used in {} blocks",
            report.live_allocations, report.used_bytes, report.reserved_bytes, report.blocks.len());
        for (i, block) in report.blocks.iter().enumerate() {
            engine_info!("aurora::ResourceAllocator",
                "  block {}: {:?}{} {} / {} bytes, {} allocations, {} free ranges",
                i, block.flags, if block.dedicated { " (dedicated)" } else { "" },
                block.used, block.size, block.allocations, block.free_ranges);
        }
    }
}

impl Default for ResourceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "resource_allocator_tests.rs"]
mod tests;
