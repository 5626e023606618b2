//! # Compiled artifacts
//!
//! Read-only view of what the hardware compiler hands back: a flat list of
//! operations, each with a type tag, open-ended attributes and input
//! references. The device attribute decides which unit runs the op.

pub mod compiler;
pub mod pattern;

pub use compiler::{artifact_path, ArtifactDirCompiler, CompileTarget, HardwareCompiler};
pub use pattern::{collect_partition_diagnostics, is_accelerator_pattern, is_fully_classified};

use crate::error::FixqResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Attribute key holding the execution device
pub const DEVICE_ATTR: &str = "device";
/// Attribute key holding the partitioner's explanation
pub const PARTITION_MSG_ATTR: &str = "partition_msg";
/// Attribute key holding a compilation error
pub const ERROR_MSG_ATTR: &str = "error_msg";

/// Ops whose only job is moving or converting data across the device boundary.
/// They never decide the device of an IR node.
pub const BOUNDARY_OP_TYPES: &[&str] = &[
    "download",
    "upload",
    "fix2float",
    "float2fix",
    "transpose",
    "fix",
    "data-fix",
];

pub fn is_boundary_op_type(op_type: &str) -> bool {
    BOUNDARY_OP_TYPES.contains(&op_type)
}

/// Heterogeneous attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StrList(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            AttrValue::IntList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            AttrValue::StrList(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(value: Vec<i64>) -> Self {
        AttrValue::IntList(value)
    }
}

/// Device named by a compiled op's `device` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpDevice {
    /// "DPU"
    Accelerator,
    /// "CPU"
    Fallback,
    /// "USER": data provided by the caller
    User,
}

impl OpDevice {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value.to_uppercase().as_str() {
            "DPU" => Some(OpDevice::Accelerator),
            "CPU" => Some(OpDevice::Fallback),
            "USER" => Some(OpDevice::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpDevice::Accelerator => "DPU",
            OpDevice::Fallback => "CPU",
            OpDevice::User => "USER",
        }
    }
}

impl fmt::Display for OpDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One operation in a compiled artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledOp {
    pub name: String,
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
    /// Names of producer ops
    #[serde(default)]
    pub inputs: Vec<String>,
}

impl CompiledOp {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            attrs: BTreeMap::new(),
            inputs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn with_device(self, device: OpDevice) -> Self {
        self.with_attr(DEVICE_ATTR, device.as_str())
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(AttrValue::as_str)
    }

    /// Device tag, if present and recognised
    pub fn device(&self) -> Option<OpDevice> {
        self.attr_str(DEVICE_ATTR).and_then(OpDevice::from_attr)
    }

    /// Partition message, falling back to the error message
    pub fn partition_msg(&self) -> &str {
        self.attr_str(PARTITION_MSG_ATTR)
            .or_else(|| self.attr_str(ERROR_MSG_ATTR))
            .unwrap_or("")
    }

    pub fn is_boundary(&self) -> bool {
        is_boundary_op_type(&self.op_type)
    }
}

/// Compiled artifact for one target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledGraph {
    pub name: String,
    #[serde(default)]
    pub ops: Vec<CompiledOp>,
}

impl CompiledGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ops: Vec::new(),
        }
    }

    pub fn with_op(mut self, op: CompiledOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn add_op(&mut self, op: CompiledOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[CompiledOp] {
        &self.ops
    }

    pub fn op(&self, name: &str) -> Option<&CompiledOp> {
        self.ops.iter().find(|op| op.name == name)
    }

    /// Producer ops of `op`; unresolved references are skipped
    pub fn input_ops(&self, op: &CompiledOp) -> Vec<&CompiledOp> {
        op.inputs.iter().filter_map(|name| self.op(name)).collect()
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> FixqResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> FixqResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_accessors() {
        let op = CompiledOp::new("conv", "conv2d-fix")
            .with_device(OpDevice::Accelerator)
            .with_attr("kernel", vec![3i64, 3])
            .with_attr("fused", true);
        assert_eq!(op.device(), Some(OpDevice::Accelerator));
        assert_eq!(op.attr("kernel").and_then(AttrValue::as_int_list), Some(&[3i64, 3][..]));
        assert_eq!(op.attr("fused").and_then(AttrValue::as_bool), Some(true));
        assert_eq!(op.attr("kernel").and_then(AttrValue::as_str), None);
    }

    #[test]
    fn test_unknown_device_is_unclassified() {
        let op = CompiledOp::new("x", "add").with_attr(DEVICE_ATTR, "TPU");
        assert_eq!(op.device(), None);
        assert_eq!(OpDevice::from_attr("cpu"), Some(OpDevice::Fallback));
    }

    #[test]
    fn test_partition_msg_fallback() {
        let op = CompiledOp::new("x", "add").with_attr(ERROR_MSG_ATTR, "unsupported");
        assert_eq!(op.partition_msg(), "unsupported");
        let op = op.with_attr(PARTITION_MSG_ATTR, "assigned to CPU");
        assert_eq!(op.partition_msg(), "assigned to CPU");
        assert_eq!(CompiledOp::new("y", "add").partition_msg(), "");
    }

    #[test]
    fn test_json_schema() {
        let json = r#"{
            "name": "net_DPUCZDX8G",
            "ops": [
                {"name": "input", "type": "data-fix", "attrs": {"device": "USER"}},
                {"name": "conv", "type": "conv2d-fix", "attrs": {"device": "DPU", "kernel": [3, 3]}, "inputs": ["input"]}
            ]
        }"#;
        let graph: CompiledGraph = serde_json::from_str(json).unwrap();
        assert_eq!(graph.ops().len(), 2);
        let conv = graph.op("conv").unwrap();
        assert_eq!(conv.attr("kernel"), Some(&AttrValue::IntList(vec![3, 3])));
        assert_eq!(graph.input_ops(conv)[0].name, "input");
        assert!(graph.op("input").unwrap().is_boundary());
    }
}
