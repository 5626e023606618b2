//! Serializable graph description used by importers
//!
//! ```yaml
//! name: tiny
//! nodes:
//!   - { name: input, op: input }
//!   - name: conv
//!     op: conv2d
//!     inputs: [input]
//!     params:
//!       - { name: conv.weight, role: weight, shape: [8, 3, 3, 3] }
//! ```

use super::node::{Node, OpType, ParamTensor};
use super::Graph;
use crate::error::{FixqError, FixqResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDesc {
    pub name: String,
    pub op: OpType,
    #[serde(default)]
    pub params: Vec<ParamTensor>,
    /// Producer names
    #[serde(default)]
    pub inputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDesc {
    pub name: String,
    pub nodes: Vec<NodeDesc>,
}

impl GraphDesc {
    /// Load a description, picking the format from the extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> FixqResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Ok(serde_json::from_str(&contents)?),
            _ => Ok(serde_yaml::from_str(&contents)?),
        }
    }

    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|n| NodeDesc {
                name: n.name.clone(),
                op: n.op_type.clone(),
                params: n.params.clone(),
                inputs: n.in_nodes.clone(),
            })
            .collect();
        Self {
            name: graph.name().to_string(),
            nodes,
        }
    }
}

impl Graph {
    /// Build a graph from a description. Nodes keep their listed order and
    /// edges may only reference nodes declared in the same description.
    pub fn from_desc(desc: GraphDesc) -> FixqResult<Self> {
        let mut graph = Graph::new(desc.name);
        let mut edges = Vec::new();
        for node_desc in desc.nodes {
            let mut node = Node::new(node_desc.name.clone(), node_desc.op);
            node.params = node_desc.params;
            for input in node_desc.inputs {
                edges.push((input, node_desc.name.clone()));
            }
            graph.add_node(node)?;
        }
        for (from, to) in edges {
            if !graph.contains(&from) {
                return Err(FixqError::invalid_input(format!(
                    "node '{}' consumes undeclared producer '{}'",
                    to, from
                )));
            }
            graph.connect(&from, &to)?;
        }
        Ok(graph)
    }
}
