use super::*;
use bytemuck::{Pod, Zeroable};
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, count_events};
use crate::memory::ResourceAllocator;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TestUniform {
    value: [f32; 4],
}

// ============================================================================
// GpuBuffer
// ============================================================================

#[test]
fn test_buffer_write_and_drop() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();

    let buffer = GpuBuffer::create(&mut device, &allocator, BufferDesc::uniform(16)).unwrap();
    assert!(buffer.write(0, &[0u8; 16]).is_ok());
    assert_eq!(buffer.size(), 16);

    drop(buffer);
    assert_eq!(count_events(&device.log, "destroy_buffer"), 1);
    assert_eq!(allocator.lock().unwrap().live_count(), 0);
}

#[test]
fn test_destroyed_buffer_rejects_writes() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();
    let mut buffer = GpuBuffer::create(&mut device, &allocator, BufferDesc::uniform(16)).unwrap();

    buffer.destroy();
    buffer.destroy();

    assert!(!buffer.is_created());
    assert!(buffer.write(0, &[1]).is_err());
}

// ============================================================================
// PerFrameUniform
// ============================================================================

#[test]
fn test_per_frame_uniform_has_one_buffer_per_slot() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();

    let uniform = PerFrameUniform::<TestUniform>::new(&mut device, &allocator, 3).unwrap();

    assert_eq!(uniform.frames(), 3);
    assert_eq!(allocator.lock().unwrap().live_count(), 3);
    assert_eq!(uniform.buffer(0).unwrap().size(), 16);
    assert!(!Arc::ptr_eq(uniform.buffer(0).unwrap(), uniform.buffer(1).unwrap()));
}

#[test]
fn test_per_frame_uniform_write_out_of_range() {
    let mut device = MockGraphicsDevice::new();
    let allocator = ResourceAllocator::new().shared();
    let uniform = PerFrameUniform::<TestUniform>::new(&mut device, &allocator, 2).unwrap();

    let value = TestUniform { value: [1.0; 4] };
    assert!(uniform.write(1, &value).is_ok());
    assert!(uniform.write(2, &value).is_err());
}
