/// GPU memory bookkeeping

pub mod resource_allocator;

pub use resource_allocator::*;
