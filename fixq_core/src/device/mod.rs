//! Device partitioning of IR nodes between the accelerator and the fallback processor

pub mod allocator;

pub use allocator::{
    find_ops_for_node, normalize_name, DeviceAllocator, DeviceAssignment, DeviceStats,
};
