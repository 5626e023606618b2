//! Baseline quant info construction
//!
//! `QuantInfoMgr` owns the quant groups of a graph and the quant config
//! derived from them, using only the static quantizability rule. Device
//! awareness is layered on top by [`TargetQuantInfoMgr`](super::TargetQuantInfoMgr).

use super::{QuantDescriptor, QuantGroups, QuantInfo, QuantSection};
use crate::config::{FixqConfig, QuantStrategy};
use crate::error::{FixqError, FixqResult};
use crate::graph::{Graph, Node, ParamRole};
use std::collections::HashSet;

/// Quant groups and baseline quant config of one graph
#[derive(Debug, Clone)]
pub struct QuantInfoMgr<'g> {
    graph: &'g Graph,
    lstm: bool,
    strategy: QuantStrategy,
    custom_quant_ops: HashSet<String>,
    quant_groups: QuantGroups,
    quant_info: QuantInfo,
}

impl<'g> QuantInfoMgr<'g> {
    pub fn new(
        graph: &'g Graph,
        lstm: bool,
        strategy: QuantStrategy,
        custom_quant_ops: HashSet<String>,
    ) -> FixqResult<Self> {
        let quant_groups = QuantGroups::from_graph(graph)?;
        let mut mgr = Self {
            graph,
            lstm,
            strategy,
            custom_quant_ops,
            quant_groups,
            quant_info: QuantInfo::new(),
        };
        mgr.quant_info = mgr.build_quant_info()?;
        log::info!(
            "Quant info for '{}': {} groups, {} params, {} outputs, {} inputs",
            graph.name(),
            mgr.quant_groups.len(),
            mgr.quant_info.len(QuantSection::Param),
            mgr.quant_info.len(QuantSection::Output),
            mgr.quant_info.len(QuantSection::Input)
        );
        Ok(mgr)
    }

    pub fn from_config(graph: &'g Graph, config: &FixqConfig) -> FixqResult<Self> {
        Self::new(
            graph,
            config.is_lstm(),
            config.strategy,
            config.custom_quant_ops.clone(),
        )
    }

    /// Static quantizability: built-in operator rule or a custom op type
    pub fn is_node_quantizable(&self, node: &Node, lstm: bool) -> bool {
        node.op_type.is_quantizable(lstm) || self.custom_quant_ops.contains(node.op_type.as_str())
    }

    /// Group the node belongs to, in forward order
    pub fn quant_group(&self, name: &str) -> FixqResult<&[String]> {
        self.quant_groups.group_of(name)
    }

    /// Node whose output carries the quantization of `name`'s group
    pub fn quant_output(&self, name: &str) -> FixqResult<&str> {
        self.quant_groups.quant_output(name)
    }

    /// Register an explicit quant group and rebuild the baseline config.
    ///
    /// Members are stored in forward graph order whatever order they are
    /// given in, so the last one in the graph becomes the quant output.
    pub fn register_quant_group(&mut self, members: Vec<String>) -> FixqResult<()> {
        let mut ordered = members
            .into_iter()
            .map(|name| {
                let id = self.graph.node_id(&name)?;
                let position = self
                    .graph
                    .node_list()
                    .position(id)
                    .ok_or(FixqError::DetachedNode(id.index()))?;
                Ok((position, name))
            })
            .collect::<FixqResult<Vec<_>>>()?;
        ordered.sort_by_key(|(position, _)| *position);

        self.quant_groups
            .register(ordered.into_iter().map(|(_, name)| name).collect())?;
        self.quant_info = self.build_quant_info()?;
        Ok(())
    }

    fn build_quant_info(&self) -> FixqResult<QuantInfo> {
        let strategy = &self.strategy;
        let activation = vec![Some(QuantDescriptor::new(strategy.activation_bits))];
        let mut info = QuantInfo::new();

        for node in self.graph.nodes() {
            if node.op_type.quantizes_input() {
                info.insert(
                    QuantSection::Input,
                    node.name.clone(),
                    vec![Some(QuantDescriptor::new(strategy.input_bits))],
                );
            }
            if !self.is_node_quantizable(node, self.lstm) {
                continue;
            }

            for param in &node.params {
                let bits = match param.role {
                    ParamRole::Bias => strategy.bias_bits,
                    _ => strategy.weight_bits,
                };
                info.insert_if_absent(
                    QuantSection::Param,
                    param.name.clone(),
                    vec![Some(QuantDescriptor::new(bits))],
                );
            }

            info.insert_if_absent(
                QuantSection::Output,
                self.quant_output(&node.name)?,
                activation.clone(),
            );
            for pred in &node.in_nodes {
                info.insert_if_absent(
                    QuantSection::Output,
                    self.quant_output(pred)?,
                    activation.clone(),
                );
            }
        }

        Ok(info)
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn lstm(&self) -> bool {
        self.lstm
    }

    pub fn strategy(&self) -> &QuantStrategy {
        &self.strategy
    }

    pub fn quant_groups(&self) -> &QuantGroups {
        &self.quant_groups
    }

    pub fn quant_info(&self) -> &QuantInfo {
        &self.quant_info
    }

    pub(crate) fn quant_info_mut(&mut self) -> &mut QuantInfo {
        &mut self.quant_info
    }
}
