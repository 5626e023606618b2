//! # Quantization config
//!
//! Quant groups, the baseline quant config built from them, and the
//! per-target pass that prunes entries the accelerator never consumes.

pub mod group;
pub mod info;
pub mod manager;
pub mod target;

pub use group::QuantGroups;
pub use info::{QuantDescriptor, QuantInfo, QuantSection, QuantSlot};
pub use manager::QuantInfoMgr;
pub use target::{PruneReport, TargetQuantInfoMgr};
