//! # fixq - fixed-point quantization partitioning
//!
//! fixq builds the quantization config a mixed accelerator/CPU deployment
//! actually needs: a model graph is compiled for a target, the compiled
//! artifact decides which nodes run on the accelerator, and quant entries the
//! accelerator never consumes are cleared.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fixq::prelude::*;
//!
//! fn main() -> AnyResult<()> {
//!     let graph = Graph::from_desc(GraphDesc::from_file("model.yaml")?)?;
//!     let config = FixqConfig::from_file("fixq.yaml")?;
//!
//!     let report = Inspector::new(ArtifactDirCompiler::new("compiled"))
//!         .inspect(&graph, &config)
//!         .context("inspection failed")?;
//!     if !report.is_classified() {
//!         bail!("compiler could not place every op: {}", report.diagnostics);
//!     }
//!     report.quant_info.save_json("quant_info.json")?;
//!     Ok(())
//! }
//! ```

// Re-export core components
pub use fixq_core::{self, *};

/// Commonly used types for applications
pub mod prelude {
    // Graph IR
    pub use fixq_core::graph::{Direction, Graph, GraphDesc, Node, OpType, ParamRole, ParamTensor};

    // Compiled artifacts
    pub use fixq_core::compiled::{
        ArtifactDirCompiler, CompileTarget, CompiledGraph, CompiledOp, HardwareCompiler, OpDevice,
    };

    // Partitioning and quantization
    pub use fixq_core::device::DeviceAllocator;
    pub use fixq_core::inspector::{InspectionReport, InspectionStatus, Inspector};
    pub use fixq_core::quant::{QuantInfo, QuantInfoMgr, QuantSection, TargetQuantInfoMgr};

    // Configuration
    pub use fixq_core::config::{FixqConfig, ModelType, QuantStrategy};

    // Error types
    pub use fixq_core::error::{FixqError, FixqResult};
    pub type Result<T> = FixqResult<T>;

    // Common traits
    pub use serde::{Deserialize, Serialize};

    // Logging macros
    pub use log::{debug, error, info, warn};

    // Re-export anyhow for error handling
    pub use anyhow::{anyhow, bail, ensure, Context, Result as AnyResult};
}
