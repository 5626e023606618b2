//! Device-aware quant config pruning for one compilation target

use super::{QuantInfo, QuantInfoMgr, QuantSection};
use crate::compiled::{CompileTarget, CompiledGraph};
use crate::config::FixqConfig;
use crate::device::DeviceAllocator;
use crate::error::{FixqError, FixqResult};
use crate::graph::{Graph, Node, OpType};
use serde::Serialize;
use std::collections::BTreeSet;

/// Entries cleared by one pruning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub params_cleared: Vec<String>,
    pub outputs_cleared: Vec<String>,
    pub inputs_cleared: Vec<String>,
    /// Outputs that stay quantized, sorted
    pub live_outputs: Vec<String>,
}

impl PruneReport {
    pub fn total_cleared(&self) -> usize {
        self.params_cleared.len() + self.outputs_cleared.len() + self.inputs_cleared.len()
    }

    /// True when the pass changed nothing
    pub fn is_noop(&self) -> bool {
        self.total_cleared() == 0
    }
}

/// Quant info manager bound to one compilation target.
///
/// Holds the baseline config so every `assign_device_info` call starts from
/// the same state, whatever the previous target pruned.
#[derive(Debug, Clone)]
pub struct TargetQuantInfoMgr<'g> {
    base: QuantInfoMgr<'g>,
    allocator: DeviceAllocator,
    baseline: QuantInfo,
}

impl<'g> TargetQuantInfoMgr<'g> {
    pub fn new(base: QuantInfoMgr<'g>, target: CompileTarget) -> Self {
        let baseline = base.quant_info().clone();
        Self {
            base,
            allocator: DeviceAllocator::new(target),
            baseline,
        }
    }

    pub fn from_config(graph: &'g Graph, config: &FixqConfig) -> FixqResult<Self> {
        let target = config.compile_target()?;
        Ok(Self::new(QuantInfoMgr::from_config(graph, config)?, target))
    }

    /// Register an explicit quant group. Resets the config to the new
    /// baseline, so pruning has to run again afterwards.
    pub fn register_quant_group(&mut self, members: Vec<String>) -> FixqResult<()> {
        self.base.register_quant_group(members)?;
        self.baseline = self.base.quant_info().clone();
        Ok(())
    }

    /// Restore the baseline config and derive device info from `compiled`
    pub fn assign_device_info(&mut self, compiled: &CompiledGraph) {
        *self.base.quant_info_mut() = self.baseline.clone();
        self.allocator.process(self.base.graph(), compiled);
    }

    /// Device-aware quantizability.
    ///
    /// Without device info only the static rule applies. With device info
    /// the node must also run on the accelerator, or be a graph input that
    /// feeds at least one accelerator node.
    pub fn is_node_quantizable(&self, node: &Node, lstm: bool) -> bool {
        if !self.base.is_node_quantizable(node, lstm) {
            return false;
        }
        if !self.allocator.has_device_info() {
            return true;
        }
        if self.allocator.is_accelerator_node(&node.name) {
            return true;
        }
        matches!(node.op_type, OpType::Input | OpType::QuantStub)
            && node
                .out_nodes
                .iter()
                .any(|succ| self.allocator.is_accelerator_node(succ))
    }

    /// Quantizability of the group containing `name`; members must agree
    pub fn is_group_quantizable(&self, name: &str, lstm: bool) -> FixqResult<bool> {
        let group = self.base.quant_group(name)?;
        let graph = self.base.graph();

        let mut quantized = Vec::new();
        let mut not_quantized = Vec::new();
        for member in group {
            if self.is_node_quantizable(graph.node(member)?, lstm) {
                quantized.push(member.clone());
            } else {
                not_quantized.push(member.clone());
            }
        }

        if !quantized.is_empty() && !not_quantized.is_empty() {
            return Err(FixqError::InconsistentQuantGroup {
                group: group.to_vec(),
                quantized,
                not_quantized,
            });
        }
        Ok(!quantized.is_empty())
    }

    /// Clear quant entries that the accelerator will never consume.
    ///
    /// The whole plan is computed before anything is cleared, so an error
    /// leaves the config as it was. Running the pass twice changes nothing
    /// the second time.
    pub fn filter_quant_config_by_device_info(&mut self) -> FixqResult<PruneReport> {
        if !self.allocator.has_device_info() {
            return Err(FixqError::invalid_input(
                "device info has not been assigned",
            ));
        }
        let report = self.plan_prune()?;
        let info = self.base.quant_info_mut();

        for key in &report.params_cleared {
            info.clear(QuantSection::Param, key);
            log::debug!("param '{}' not quantized on {}", key, self.allocator.target());
        }
        for key in &report.outputs_cleared {
            info.clear(QuantSection::Output, key);
            log::debug!("output '{}' not quantized on {}", key, self.allocator.target());
        }
        for key in &report.inputs_cleared {
            info.clear(QuantSection::Input, key);
            log::debug!("input '{}' not quantized on {}", key, self.allocator.target());
        }

        log::info!(
            "Pruned quant config for {}: {} params, {} outputs, {} inputs cleared",
            self.allocator.target(),
            report.params_cleared.len(),
            report.outputs_cleared.len(),
            report.inputs_cleared.len()
        );
        Ok(report)
    }

    fn plan_prune(&self) -> FixqResult<PruneReport> {
        let graph = self.base.graph();
        let info = self.base.quant_info();
        let lstm = self.base.lstm();
        let mut report = PruneReport::default();

        for node in graph.nodes() {
            if self.allocator.is_accelerator_node(&node.name) {
                continue;
            }
            for param in &node.params {
                if info.is_quantized(QuantSection::Param, &param.name) {
                    report.params_cleared.push(param.name.clone());
                }
            }
        }

        // Outputs are settled before inputs are looked at
        let mut live = BTreeSet::new();
        for node in graph.nodes() {
            if !self.is_group_quantizable(&node.name, lstm)? {
                continue;
            }
            live.insert(self.base.quant_output(&node.name)?.to_string());
            for pred in &node.in_nodes {
                live.insert(self.base.quant_output(pred)?.to_string());
            }
        }
        report.outputs_cleared = info
            .keys(QuantSection::Output)
            .into_iter()
            .filter(|key| !live.contains(key) && info.is_quantized(QuantSection::Output, key))
            .collect();

        for key in info.keys(QuantSection::Input) {
            if !info.is_quantized(QuantSection::Input, &key) {
                continue;
            }
            let group = self.base.quant_group(&key)?;
            if group.iter().all(|m| !self.allocator.is_accelerator_node(m)) {
                report.inputs_cleared.push(key);
            }
        }

        report.live_outputs = live.into_iter().collect();
        Ok(report)
    }

    /// Current quant config as JSON
    pub fn export_quant_config(&self) -> FixqResult<serde_json::Value> {
        self.base.quant_info().to_json_value()
    }

    pub fn target(&self) -> &CompileTarget {
        self.allocator.target()
    }

    pub fn allocator(&self) -> &DeviceAllocator {
        &self.allocator
    }

    pub fn base(&self) -> &QuantInfoMgr<'g> {
        &self.base
    }

    pub fn quant_info(&self) -> &QuantInfo {
        self.base.quant_info()
    }

    /// Config as built before any device info was applied
    pub fn baseline(&self) -> &QuantInfo {
        &self.baseline
    }
}
