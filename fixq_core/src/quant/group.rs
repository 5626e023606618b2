//! Quant groups: nodes forced to share quantization parameters

use crate::error::{FixqError, FixqResult};
use crate::graph::Graph;
use std::collections::HashMap;

/// Partition of node names into quant groups.
///
/// Every member maps back to its whole group. Members are kept in forward
/// graph order, so the last member is the group's quant output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuantGroups {
    /// Dissolved groups are left empty so indices stay valid
    groups: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl QuantGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive groups from fusable operator chains.
    ///
    /// A chain starts at a fusion head (conv, dense, matmul, batchnorm, add)
    /// and absorbs the sole consumer while that consumer is a fusable tail
    /// with a single producer. Activations end a chain. Remaining nodes get
    /// singleton groups.
    pub fn from_graph(graph: &Graph) -> FixqResult<Self> {
        let mut groups = Self::new();

        for node in graph.nodes() {
            if groups.contains(&node.name) {
                continue;
            }
            let mut members = vec![node.name.clone()];
            let mut tail = node;
            while tail.op_type.is_fusion_head() && tail.out_nodes.len() == 1 {
                let next = graph.node(&tail.out_nodes[0])?;
                let fusable = next.in_nodes.len() == 1
                    && next.op_type.is_fusable_tail()
                    && !groups.contains(&next.name)
                    && !members.contains(&next.name);
                if !fusable {
                    break;
                }
                members.push(next.name.clone());
                tail = next;
            }
            if members.len() > 1 {
                log::debug!("fused quant group {:?}", members);
            }
            groups.push_group(members);
        }

        Ok(groups)
    }

    /// Register an explicit group, dissolving the singleton groups of its
    /// members. Members already in a multi-node group are a conflict.
    ///
    /// `members` must already be in forward graph order; the last one is
    /// taken as the quant output.
    pub fn register(&mut self, members: Vec<String>) -> FixqResult<()> {
        if members.is_empty() {
            return Err(FixqError::invalid_input("quant group must not be empty"));
        }
        for (i, name) in members.iter().enumerate() {
            if members[..i].contains(name) {
                return Err(FixqError::invalid_input(format!(
                    "node '{}' listed twice in quant group",
                    name
                )));
            }
            if let Some(&idx) = self.index.get(name) {
                if self.groups[idx].len() > 1 {
                    return Err(FixqError::GroupConflict {
                        node: name.clone(),
                        existing: self.groups[idx].clone(),
                    });
                }
            }
        }
        for name in &members {
            if let Some(idx) = self.index.remove(name) {
                self.groups[idx].clear();
            }
        }
        self.push_group(members);
        Ok(())
    }

    /// Full group of `name`
    pub fn group_of(&self, name: &str) -> FixqResult<&[String]> {
        self.index
            .get(name)
            .map(|&idx| self.groups[idx].as_slice())
            .ok_or_else(|| FixqError::MissingQuantGroup(name.to_string()))
    }

    /// Member whose output carries the group's quantization
    pub fn quant_output(&self, name: &str) -> FixqResult<&str> {
        self.group_of(name)?
            .last()
            .map(String::as_str)
            .ok_or_else(|| FixqError::MissingQuantGroup(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of live groups
    pub fn len(&self) -> usize {
        self.groups.iter().filter(|g| !g.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &[String]> + '_ {
        self.groups
            .iter()
            .filter(|g| !g.is_empty())
            .map(Vec::as_slice)
    }

    fn push_group(&mut self, members: Vec<String>) {
        let idx = self.groups.len();
        for name in &members {
            self.index.insert(name.clone(), idx);
        }
        self.groups.push(members);
    }
}
