use crate::compiled::{CompileTarget, CompiledGraph, CompiledOp, OpDevice};
use crate::graph::{DeviceTag, Graph};
use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

/// Characters the compiled-graph namespace does not accept in op names
static ILLEGAL_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_./\-]").expect("static regex"));

/// Separator substituted for illegal characters
pub const NAME_SEPARATOR: &str = "_";

/// Rewrite an IR node name into the compiled-graph namespace
pub fn normalize_name(name: &str) -> String {
    ILLEGAL_NAME_CHARS
        .replace_all(name, NAME_SEPARATOR)
        .into_owned()
}

/// Characters that may follow a node name inside a derived op name
const NAME_BOUNDARY_CHARS: &[char] = &['_', '/', '.'];

/// Non-boundary compiled ops produced from the IR node `node_name`.
///
/// An op with exactly the normalized name wins. Otherwise an op matches when
/// it contains the name followed by a separator or the end of the op name,
/// so `conv1` never picks up `conv10`.
pub fn find_ops_for_node<'a>(node_name: &str, compiled: &'a CompiledGraph) -> Vec<&'a CompiledOp> {
    let formal_name = normalize_name(node_name);
    if formal_name.is_empty() {
        return Vec::new();
    }
    let candidates: Vec<&CompiledOp> = compiled
        .ops()
        .iter()
        .filter(|op| !op.is_boundary())
        .collect();

    let exact: Vec<&CompiledOp> = candidates
        .iter()
        .copied()
        .filter(|op| op.name == formal_name)
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    candidates
        .into_iter()
        .filter(|op| contains_name_segment(&op.name, &formal_name))
        .collect()
}

fn contains_name_segment(op_name: &str, name: &str) -> bool {
    op_name.match_indices(name).any(|(start, _)| {
        op_name[start + name.len()..]
            .chars()
            .next()
            .map_or(true, |c| NAME_BOUNDARY_CHARS.contains(&c))
    })
}

/// Node name to device mapping for one target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceAssignment {
    assignments: HashMap<String, DeviceTag>,
}

impl DeviceAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tag: DeviceTag) {
        self.assignments.insert(name.into(), tag);
    }

    pub fn get(&self, name: &str) -> Option<DeviceTag> {
        self.assignments.get(name).copied()
    }

    /// Absent names are never accelerator nodes
    pub fn is_accelerator(&self, name: &str) -> bool {
        self.get(name) == Some(DeviceTag::Accelerator)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Sorted names of the nodes assigned to `tag`
    pub fn nodes_on(&self, tag: DeviceTag) -> Vec<String> {
        let mut names: Vec<String> = self
            .assignments
            .iter()
            .filter(|(_, &t)| t == tag)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> DeviceStats {
        let mut stats = DeviceStats {
            assigned: self.assignments.len(),
            ..Default::default()
        };
        for tag in self.assignments.values() {
            match tag {
                DeviceTag::Accelerator => stats.accelerator += 1,
                DeviceTag::Fallback => stats.fallback += 1,
                DeviceTag::Unassigned => {}
            }
        }
        stats
    }

    /// Write the assignment onto the graph's node tags, clearing stale ones first
    pub fn stamp(&self, graph: &mut Graph) {
        graph.clear_devices();
        for (name, tag) in &self.assignments {
            if let Some(node) = graph.node_mut(name) {
                node.device = *tag;
            }
        }
    }
}

/// Counts per device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub assigned: usize,
    pub accelerator: usize,
    pub fallback: usize,
}

impl DeviceStats {
    /// Share of assigned nodes running on the accelerator
    pub fn accelerator_percent(&self) -> f64 {
        if self.assigned == 0 {
            0.0
        } else {
            (self.accelerator as f64 / self.assigned as f64) * 100.0
        }
    }
}

/// Assigns IR nodes to the accelerator or the fallback processor by reading
/// the device tags of a compiled artifact
#[derive(Debug, Clone)]
pub struct DeviceAllocator {
    target: CompileTarget,
    /// None until an artifact has been processed
    assignment: Option<DeviceAssignment>,
}

impl DeviceAllocator {
    pub fn new(target: CompileTarget) -> Self {
        Self {
            target,
            assignment: None,
        }
    }

    pub fn target(&self) -> &CompileTarget {
        &self.target
    }

    /// Rebuild the assignment from a (pattern-validated) compiled artifact.
    ///
    /// A node whose matching ops all sit on the accelerator is an accelerator
    /// node; any other match makes it a fallback node. Nodes without a match
    /// get no entry.
    pub fn process(&mut self, graph: &Graph, compiled: &CompiledGraph) {
        let mut assignment = DeviceAssignment::new();

        for node in graph.nodes() {
            let ops = find_ops_for_node(&node.name, compiled);
            if ops.is_empty() {
                continue;
            }
            let tag = if ops.iter().all(|op| op.device() == Some(OpDevice::Accelerator)) {
                DeviceTag::Accelerator
            } else {
                DeviceTag::Fallback
            };
            log::debug!("node '{}' -> {} ({} compiled ops)", node.name, tag, ops.len());
            assignment.insert(node.name.clone(), tag);
        }

        let stats = assignment.stats();
        log::info!(
            "Device allocation for {}: {} accelerator, {} fallback, {} unmatched",
            self.target,
            stats.accelerator,
            stats.fallback,
            graph.len().saturating_sub(stats.assigned)
        );
        self.assignment = Some(assignment);
    }

    /// Drop device information, e.g. before switching targets
    pub fn reset(&mut self) {
        self.assignment = None;
    }

    /// False until `process` has run
    pub fn has_device_info(&self) -> bool {
        self.assignment.is_some()
    }

    pub fn assignment(&self) -> Option<&DeviceAssignment> {
        self.assignment.as_ref()
    }

    pub fn device_of(&self, name: &str) -> Option<DeviceTag> {
        self.assignment.as_ref().and_then(|a| a.get(name))
    }

    /// Fail-closed accelerator query
    pub fn is_accelerator_node(&self, name: &str) -> bool {
        self.assignment
            .as_ref()
            .map(|a| a.is_accelerator(name))
            .unwrap_or(false)
    }

    /// Print the assignment as a table
    pub fn print_assignment(&self) {
        println!("\n=== Device Assignment ({}) ===", self.target);

        let Some(assignment) = &self.assignment else {
            println!("{}", "No device information".yellow());
            return;
        };

        let stats = assignment.stats();
        println!("Assigned Nodes: {}", stats.assigned);
        println!(
            "{:<14} {:>8} {:>8}",
            "Device", "Count", "Percent"
        );
        println!("{}", "-".repeat(32));
        println!(
            "{:<14} {:>8} {:>7.1}%",
            "accelerator".green(),
            stats.accelerator,
            stats.accelerator_percent()
        );
        println!(
            "{:<14} {:>8} {:>7.1}%",
            "fallback".red(),
            stats.fallback,
            100.0 - stats.accelerator_percent()
        );

        let fallback = assignment.nodes_on(DeviceTag::Fallback);
        if !fallback.is_empty() {
            println!("\nFallback nodes:");
            for name in fallback {
                println!("  - {}", name);
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, OpType};

    fn graph() -> Graph {
        let mut graph = Graph::new("net");
        for (name, op) in [
            ("Net::input_0", OpType::Input),
            ("Net/Conv2d[conv1]/input.2", OpType::Conv2d),
            ("Net/Softmax[head]/output", OpType::Softmax),
        ] {
            graph.add_node(Node::new(name, op)).unwrap();
        }
        graph
    }

    fn compiled() -> CompiledGraph {
        CompiledGraph::new("net")
            .with_op(CompiledOp::new("Net__input_0", "data").with_device(OpDevice::Accelerator))
            .with_op(
                CompiledOp::new("Net__input_0_upload", "upload").with_device(OpDevice::Fallback),
            )
            .with_op(
                CompiledOp::new("Net/Conv2d_conv1_/input.2", "conv2d-fix")
                    .with_device(OpDevice::Accelerator),
            )
            .with_op(
                CompiledOp::new("Net/Conv2d_conv1_/input.2_fix", "fix")
                    .with_device(OpDevice::Fallback),
            )
            .with_op(
                CompiledOp::new("Net/Softmax_head_/output", "softmax")
                    .with_device(OpDevice::Fallback),
            )
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Net/Conv2d[conv1]/input.2"), "Net/Conv2d_conv1_/input.2");
        assert_eq!(normalize_name("Net::input_0"), "Net__input_0");
        assert_eq!(normalize_name("plain-name"), "plain-name");
    }

    #[test]
    fn test_name_prefix_is_not_a_match() {
        let mut graph = Graph::new("net");
        graph.add_node(Node::new("conv1", OpType::Conv2d)).unwrap();
        graph.add_node(Node::new("conv10", OpType::Conv2d)).unwrap();
        let compiled = CompiledGraph::new("net")
            .with_op(CompiledOp::new("conv1", "conv2d-fix").with_device(OpDevice::Accelerator))
            .with_op(CompiledOp::new("conv10", "conv2d-fix").with_device(OpDevice::Fallback));

        let mut allocator = DeviceAllocator::new(CompileTarget::Name("DPUCZDX8G".into()));
        allocator.process(&graph, &compiled);
        assert_eq!(allocator.device_of("conv1"), Some(DeviceTag::Accelerator));
        assert!(allocator.is_accelerator_node("conv1"));
        assert_eq!(allocator.device_of("conv10"), Some(DeviceTag::Fallback));
    }

    #[test]
    fn test_segment_match_without_exact_op() {
        let compiled = CompiledGraph::new("net")
            .with_op(CompiledOp::new("block/conv1_merged", "conv2d-fix"))
            .with_op(CompiledOp::new("block/conv10", "conv2d-fix"))
            .with_op(CompiledOp::new("block/conv1", "eltwise-fix"));
        let names: Vec<&str> = find_ops_for_node("conv1", &compiled)
            .iter()
            .map(|op| op.name.as_str())
            .collect();
        assert_eq!(names, vec!["block/conv1_merged", "block/conv1"]);
    }

    #[test]
    fn test_boundary_ops_skipped() {
        let compiled = compiled();
        let ops = find_ops_for_node("Net/Conv2d[conv1]/input.2", &compiled);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op_type, "conv2d-fix");
    }

    #[test]
    fn test_process() {
        let graph = graph();
        let mut allocator = DeviceAllocator::new(CompileTarget::Name("DPUCZDX8G".into()));
        allocator.process(&graph, &compiled());

        assert!(allocator.is_accelerator_node("Net::input_0"));
        assert!(allocator.is_accelerator_node("Net/Conv2d[conv1]/input.2"));
        assert!(!allocator.is_accelerator_node("Net/Softmax[head]/output"));
        assert_eq!(
            allocator.device_of("Net/Softmax[head]/output"),
            Some(DeviceTag::Fallback)
        );

        let stats = allocator.assignment().unwrap().stats();
        assert_eq!(stats.accelerator, 2);
        assert_eq!(stats.fallback, 1);
    }

    #[test]
    fn test_fail_closed_without_info() {
        let allocator = DeviceAllocator::new(CompileTarget::Name("DPUCZDX8G".into()));
        assert!(!allocator.has_device_info());
        assert!(!allocator.is_accelerator_node("Net::input_0"));
        assert_eq!(allocator.device_of("Net::input_0"), None);
    }

    #[test]
    fn test_unknown_name_is_not_accelerator() {
        let graph = graph();
        let mut allocator = DeviceAllocator::new(CompileTarget::Name("DPUCZDX8G".into()));
        allocator.process(&graph, &compiled());
        assert!(!allocator.is_accelerator_node("never_submitted"));
    }

    #[test]
    fn test_reprocess_does_not_leak() {
        let graph = graph();
        let mut allocator = DeviceAllocator::new(CompileTarget::Name("DPUCZDX8G".into()));
        allocator.process(&graph, &compiled());
        allocator.process(&graph, &CompiledGraph::new("empty"));
        assert!(allocator.has_device_info());
        assert!(!allocator.is_accelerator_node("Net::input_0"));
        assert!(allocator.assignment().unwrap().is_empty());
    }

    #[test]
    fn test_print_assignment() {
        let graph = graph();
        let mut allocator = DeviceAllocator::new(CompileTarget::Name("DPUCZDX8G".into()));
        allocator.print_assignment();
        allocator.process(&graph, &compiled());
        allocator.print_assignment();
        assert_eq!(
            allocator.assignment().unwrap().nodes_on(DeviceTag::Fallback),
            vec!["Net/Softmax[head]/output"]
        );
    }

    #[test]
    fn test_stamp() {
        let mut graph = graph();
        let mut allocator = DeviceAllocator::new(CompileTarget::Name("DPUCZDX8G".into()));
        allocator.process(&graph, &compiled());
        allocator.assignment().unwrap().stamp(&mut graph);
        assert_eq!(
            graph.node("Net/Conv2d[conv1]/input.2").unwrap().device,
            DeviceTag::Accelerator
        );
        assert_eq!(
            graph.node("Net/Softmax[head]/output").unwrap().device,
            DeviceTag::Fallback
        );
    }
}
