//! # fixq Core
//!
//! Graph IR and quantization-config partitioning for fixed-point accelerators.
//!
//! A model graph is compiled for a hardware target; the compiled artifact says
//! which operations run on the accelerator and which fall back to the host
//! processor. This crate turns that into a per-target quantization config:
//!
//! - **Graph**: ordered node arena with stable forward and backward traversal
//! - **Compiled**: compiled-artifact view and partition pattern validation
//! - **Device**: mapping of IR nodes to the accelerator or the fallback unit
//! - **Quant**: quant groups, baseline quant config and device-aware pruning
//! - **Inspector**: the whole pipeline for one target
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fixq_core::{ArtifactDirCompiler, FixqConfig, Graph, GraphDesc, Inspector};
//!
//! # fn main() -> fixq_core::FixqResult<()> {
//! let graph = Graph::from_desc(GraphDesc::from_file("resnet.yaml")?)?;
//! let config = FixqConfig::find_and_load()?;
//!
//! let inspector = Inspector::new(ArtifactDirCompiler::new("compiled"));
//! let report = inspector.inspect(&graph, &config)?;
//! report.quant_info.save_json("quant_info.json")?;
//! # Ok(())
//! # }
//! ```

pub mod compiled;
pub mod config;
pub mod device;
pub mod error;
pub mod graph;
pub mod inspector;
pub mod quant;

// Re-export commonly used types for easy access
pub use compiled::{ArtifactDirCompiler, CompileTarget, CompiledGraph, CompiledOp, HardwareCompiler};
pub use config::{FixqConfig, ModelType, QuantStrategy};
pub use device::{DeviceAllocator, DeviceAssignment};
pub use error::{FixqError, FixqResult};
pub use graph::{Direction, Graph, GraphDesc, Node, OpType};
pub use inspector::{InspectionReport, InspectionStatus, Inspector};
pub use quant::{PruneReport, QuantInfo, QuantInfoMgr, TargetQuantInfoMgr};
