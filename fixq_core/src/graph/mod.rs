//! # Graph IR
//!
//! The graph owns every [`Node`] and indexes them by name. Ordering comes from
//! the [`NodeList`] arena, which keeps forward and backward traversal stable
//! while nodes are spliced in.
//!
//! Topology is built once by the importer and then treated as read-only by
//! the quantization passes, which borrow the graph immutably.

pub mod desc;
pub mod node;
pub mod node_list;

pub use desc::{GraphDesc, NodeDesc};
pub use node::{DeviceTag, Node, OpType, ParamRole, ParamTensor};
pub use node_list::{
    Direction, NodeCursor, NodeId, NodeList, APPEND_INTERVAL, MID_POSITION,
};

use crate::error::{FixqError, FixqResult};
use std::collections::HashMap;

/// A named operation graph
#[derive(Debug, Clone, Default)]
pub struct Graph {
    name: String,
    list: NodeList<Node>,
    index: HashMap<String, NodeId>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            list: NodeList::new(),
            index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Underlying ordered list, for position and link inspection
    pub fn node_list(&self) -> &NodeList<Node> {
        &self.list
    }

    /// Append a node at the forward tail
    pub fn add_node(&mut self, node: Node) -> FixqResult<NodeId> {
        self.ensure_unique(&node.name)?;
        let name = node.name.clone();
        let id = self.list.push_back(node)?;
        self.index.insert(name, id);
        Ok(id)
    }

    /// Splice a node after `anchor` in the given direction
    pub fn insert_node_after(
        &mut self,
        anchor: &str,
        node: Node,
        direction: Direction,
    ) -> FixqResult<NodeId> {
        let anchor_id = self.node_id(anchor)?;
        self.ensure_unique(&node.name)?;
        let name = node.name.clone();
        let id = self.list.insert_after(anchor_id, node, direction)?;
        self.index.insert(name, id);
        Ok(id)
    }

    /// Unlink a node and drop every edge that references it
    pub fn remove_node(&mut self, name: &str) -> FixqResult<Node> {
        let id = self.node_id(name)?;
        let node = self.list.remove(id)?;
        self.index.remove(name);
        for producer in &node.in_nodes {
            if let Some(p) = self.node_mut(producer) {
                p.out_nodes.retain(|n| n != name);
            }
        }
        for consumer in &node.out_nodes {
            if let Some(c) = self.node_mut(consumer) {
                c.in_nodes.retain(|n| n != name);
            }
        }
        Ok(node)
    }

    /// Add a data edge `from -> to`
    pub fn connect(&mut self, from: &str, to: &str) -> FixqResult<()> {
        self.node_id(from)?;
        self.node_id(to)?;
        if let Some(src) = self.node_mut(from) {
            if !src.out_nodes.iter().any(|n| n == to) {
                src.out_nodes.push(to.to_string());
            }
        }
        if let Some(dst) = self.node_mut(to) {
            if !dst.in_nodes.iter().any(|n| n == from) {
                dst.in_nodes.push(from.to_string());
            }
        }
        Ok(())
    }

    pub fn node_id(&self, name: &str) -> FixqResult<NodeId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| FixqError::NodeNotFound(name.to_string()))
    }

    /// Look up a node by name
    pub fn node(&self, name: &str) -> FixqResult<&Node> {
        let id = self.node_id(name)?;
        self.list
            .get(id)
            .ok_or_else(|| FixqError::NodeNotFound(name.to_string()))
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.index.get(name).and_then(|id| self.list.get(*id))
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        let id = *self.index.get(name)?;
        self.list.get_mut(id)
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.list.get(id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Nodes in forward order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.list.iter(Direction::Forward).map(|(_, node)| node)
    }

    /// Nodes in the given direction, starting at the head
    pub fn nodes_in(&self, direction: Direction) -> impl Iterator<Item = &Node> + '_ {
        self.list.iter(direction).map(|(_, node)| node)
    }

    /// Ring rotation starting at `start`
    pub fn iter_from(
        &self,
        start: &str,
        direction: Direction,
    ) -> FixqResult<impl Iterator<Item = &Node> + '_> {
        let id = self.node_id(start)?;
        Ok(self.list.iter_from(id, direction).map(|(_, node)| node))
    }

    pub fn cursor(&self, direction: Direction) -> NodeCursor {
        self.list.cursor(NodeId::HEAD, direction)
    }

    /// Producers of `name`
    pub fn in_nodes(&self, name: &str) -> FixqResult<Vec<&Node>> {
        self.node(name)?
            .in_nodes
            .iter()
            .map(|n| self.node(n))
            .collect()
    }

    /// Consumers of `name`
    pub fn out_nodes(&self, name: &str) -> FixqResult<Vec<&Node>> {
        self.node(name)?
            .out_nodes
            .iter()
            .map(|n| self.node(n))
            .collect()
    }

    pub fn check_positions(&self) -> bool {
        self.list.check_positions()
    }

    /// Reset every node to `DeviceTag::Unassigned`
    pub fn clear_devices(&mut self) {
        let names: Vec<String> = self.index.keys().cloned().collect();
        for name in names {
            if let Some(node) = self.node_mut(&name) {
                node.device = DeviceTag::Unassigned;
            }
        }
    }

    fn ensure_unique(&self, name: &str) -> FixqResult<()> {
        if self.index.contains_key(name) {
            return Err(FixqError::DuplicateNode(name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Graph {
        let mut graph = Graph::new("chain");
        graph.add_node(Node::new("input", OpType::Input)).unwrap();
        graph
            .add_node(Node::new("conv", OpType::Conv2d).with_weight_and_bias())
            .unwrap();
        graph.add_node(Node::new("relu", OpType::Relu)).unwrap();
        graph.connect("input", "conv").unwrap();
        graph.connect("conv", "relu").unwrap();
        graph
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut graph = chain();
        let err = graph.add_node(Node::new("conv", OpType::Relu)).unwrap_err();
        assert!(matches!(err, FixqError::DuplicateNode(name) if name == "conv"));
    }

    #[test]
    fn test_edges() {
        let graph = chain();
        let producers: Vec<&str> = graph
            .in_nodes("conv")
            .unwrap()
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(producers, vec!["input"]);
        assert_eq!(graph.node("input").unwrap().out_nodes, vec!["conv"]);
    }

    #[test]
    fn test_connect_unknown_node() {
        let mut graph = chain();
        assert!(matches!(
            graph.connect("conv", "missing"),
            Err(FixqError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_insert_and_remove() {
        let mut graph = chain();
        graph
            .insert_node_after("conv", Node::new("bn", OpType::BatchNorm), Direction::Forward)
            .unwrap();
        let order: Vec<&str> = graph.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(order, vec!["input", "conv", "bn", "relu"]);

        graph.remove_node("conv").unwrap();
        assert!(graph.node("input").unwrap().out_nodes.is_empty());
        assert!(graph.node("relu").unwrap().in_nodes.is_empty());
        assert!(!graph.contains("conv"));
        assert!(graph.check_positions());
    }

    #[test]
    fn test_iter_from_named_node() {
        let graph = chain();
        let order: Vec<&str> = graph
            .iter_from("relu", Direction::Backward)
            .unwrap()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(order, vec!["relu", "conv", "input"]);
    }
}
