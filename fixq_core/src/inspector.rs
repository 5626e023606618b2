//! End-to-end inspection for one compilation target
//!
//! compile -> classification gate -> pattern check -> device allocation ->
//! quant config pruning

use crate::compiled::{
    artifact_path, collect_partition_diagnostics, is_accelerator_pattern, is_fully_classified,
    CompileTarget, HardwareCompiler,
};
use crate::config::FixqConfig;
use crate::device::DeviceStats;
use crate::error::FixqResult;
use crate::graph::Graph;
use crate::quant::{PruneReport, QuantInfo, TargetQuantInfoMgr};
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of the classification gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStatus {
    /// Every compiled op carries a device and no error
    Classified,
    /// Device tags cannot be trusted; nothing was pruned
    Unclassified,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectionReport {
    pub target: CompileTarget,
    pub status: InspectionStatus,
    /// Whole graph runs on the accelerator apart from boundary conversions
    pub accelerator_pattern: bool,
    /// Concatenated partition and error messages of the compiled ops
    pub diagnostics: String,
    pub device_stats: Option<DeviceStats>,
    pub prune: Option<PruneReport>,
    /// Pruned config, or the baseline when unclassified
    pub quant_info: QuantInfo,
    /// Where the compiled artifact was dumped, if it was
    pub debug_artifact: Option<PathBuf>,
}

impl InspectionReport {
    pub fn is_classified(&self) -> bool {
        self.status == InspectionStatus::Classified
    }
}

/// Runs the partition pipeline against a hardware compiler
pub struct Inspector<C: HardwareCompiler> {
    compiler: C,
}

impl<C: HardwareCompiler> Inspector<C> {
    pub fn new(compiler: C) -> Self {
        Self { compiler }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn inspect(&self, graph: &Graph, config: &FixqConfig) -> FixqResult<InspectionReport> {
        let mut mgr = TargetQuantInfoMgr::from_config(graph, config)?;
        let target = mgr.target().clone();

        log::info!("Compiling '{}' for {}", graph.name(), target);
        let compiled = self.compiler.compile(graph, &target)?;

        let debug_artifact = if config.inspect_debug {
            let path = artifact_path(&config.debug_dir, graph.name(), &target);
            compiled.save_json(&path)?;
            log::info!("Compiled artifact written to {}", path.display());
            Some(path)
        } else {
            None
        };

        let diagnostics = collect_partition_diagnostics(&compiled);

        if !is_fully_classified(&compiled) {
            log::warn!(
                "'{}' is not fully classified for {}: {}",
                graph.name(),
                target,
                diagnostics
            );
            return Ok(InspectionReport {
                target,
                status: InspectionStatus::Unclassified,
                accelerator_pattern: false,
                diagnostics,
                device_stats: None,
                prune: None,
                quant_info: mgr.quant_info().clone(),
                debug_artifact,
            });
        }

        let accelerator_pattern = is_accelerator_pattern(&compiled);
        if !accelerator_pattern {
            log::info!("'{}' is partitioned across devices for {}", graph.name(), target);
        }

        mgr.assign_device_info(&compiled);
        let prune = mgr.filter_quant_config_by_device_info()?;
        let device_stats = mgr.allocator().assignment().map(|a| a.stats());

        Ok(InspectionReport {
            target,
            status: InspectionStatus::Classified,
            accelerator_pattern,
            diagnostics,
            device_stats,
            prune: Some(prune),
            quant_info: mgr.quant_info().clone(),
            debug_artifact,
        })
    }
}
