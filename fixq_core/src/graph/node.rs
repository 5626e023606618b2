//! Graph node types: operator vocabulary, parameter tensors and device tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operator vocabulary understood by the quantizer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OpType {
    Input,
    QuantStub,
    DeQuantStub,
    Conv2d,
    DepthwiseConv2d,
    ConvTranspose2d,
    Dense,
    MatMul,
    BatchNorm,
    Relu,
    Relu6,
    LeakyRelu,
    Hardswish,
    Hardsigmoid,
    Sigmoid,
    Tanh,
    Softmax,
    MaxPool,
    AvgPool,
    AdaptiveAvgPool,
    Add,
    Mul,
    Concat,
    Reshape,
    Flatten,
    Transpose,
    Upsample,
    Lstm,
    /// Operator outside the built-in vocabulary
    Custom(String),
}

impl OpType {
    /// Canonical snake_case name
    pub fn as_str(&self) -> &str {
        match self {
            OpType::Input => "input",
            OpType::QuantStub => "quant_stub",
            OpType::DeQuantStub => "dequant_stub",
            OpType::Conv2d => "conv2d",
            OpType::DepthwiseConv2d => "depthwise_conv2d",
            OpType::ConvTranspose2d => "conv_transpose2d",
            OpType::Dense => "dense",
            OpType::MatMul => "matmul",
            OpType::BatchNorm => "batch_norm",
            OpType::Relu => "relu",
            OpType::Relu6 => "relu6",
            OpType::LeakyRelu => "leaky_relu",
            OpType::Hardswish => "hardswish",
            OpType::Hardsigmoid => "hardsigmoid",
            OpType::Sigmoid => "sigmoid",
            OpType::Tanh => "tanh",
            OpType::Softmax => "softmax",
            OpType::MaxPool => "max_pool",
            OpType::AvgPool => "avg_pool",
            OpType::AdaptiveAvgPool => "adaptive_avg_pool",
            OpType::Add => "add",
            OpType::Mul => "mul",
            OpType::Concat => "concat",
            OpType::Reshape => "reshape",
            OpType::Flatten => "flatten",
            OpType::Transpose => "transpose",
            OpType::Upsample => "upsample",
            OpType::Lstm => "lstm",
            OpType::Custom(name) => name,
        }
    }

    /// Map a `Custom` name that spells a built-in operator back to the
    /// built-in variant, so the string form parses back to the same value
    pub fn normalized(self) -> Self {
        match self {
            OpType::Custom(name) => match name.parse::<OpType>() {
                Ok(op) => op,
                Err(_) => OpType::Custom(name),
            },
            op => op,
        }
    }

    /// Static quantizability rule.
    ///
    /// Recurrent models run their gate non-linearities in fixed point, so
    /// `Sigmoid`, `Tanh` and whole `Lstm` cells only count when `lstm` is set.
    pub fn is_quantizable(&self, lstm: bool) -> bool {
        match self {
            OpType::Input
            | OpType::QuantStub
            | OpType::Conv2d
            | OpType::DepthwiseConv2d
            | OpType::ConvTranspose2d
            | OpType::Dense
            | OpType::MatMul
            | OpType::BatchNorm
            | OpType::Relu
            | OpType::Relu6
            | OpType::LeakyRelu
            | OpType::Hardswish
            | OpType::Hardsigmoid
            | OpType::MaxPool
            | OpType::AvgPool
            | OpType::AdaptiveAvgPool
            | OpType::Add
            | OpType::Mul
            | OpType::Concat
            | OpType::Upsample => true,
            OpType::Sigmoid | OpType::Tanh | OpType::Lstm => lstm,
            OpType::DeQuantStub
            | OpType::Softmax
            | OpType::Reshape
            | OpType::Flatten
            | OpType::Transpose
            | OpType::Custom(_) => false,
        }
    }

    /// Ops that carry an input quant entry (graph entry and exit stubs)
    pub fn quantizes_input(&self) -> bool {
        matches!(
            self,
            OpType::Input | OpType::QuantStub | OpType::DeQuantStub
        )
    }

    /// Ops that start a fusion chain
    pub fn is_fusion_head(&self) -> bool {
        matches!(
            self,
            OpType::Conv2d
                | OpType::DepthwiseConv2d
                | OpType::ConvTranspose2d
                | OpType::Dense
                | OpType::MatMul
                | OpType::BatchNorm
                | OpType::Add
        )
    }

    /// Ops that may be fused onto the end of a chain
    pub fn is_fusable_tail(&self) -> bool {
        matches!(
            self,
            OpType::BatchNorm
                | OpType::Relu
                | OpType::Relu6
                | OpType::LeakyRelu
                | OpType::Hardswish
                | OpType::Hardsigmoid
        )
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.to_lowercase().as_str() {
            "input" => OpType::Input,
            "quant_stub" | "quantstub" => OpType::QuantStub,
            "dequant_stub" | "dequantstub" => OpType::DeQuantStub,
            "conv2d" => OpType::Conv2d,
            "depthwise_conv2d" => OpType::DepthwiseConv2d,
            "conv_transpose2d" => OpType::ConvTranspose2d,
            "dense" | "linear" => OpType::Dense,
            "matmul" => OpType::MatMul,
            "batch_norm" | "batchnorm" => OpType::BatchNorm,
            "relu" => OpType::Relu,
            "relu6" => OpType::Relu6,
            "leaky_relu" => OpType::LeakyRelu,
            "hardswish" => OpType::Hardswish,
            "hardsigmoid" => OpType::Hardsigmoid,
            "sigmoid" => OpType::Sigmoid,
            "tanh" => OpType::Tanh,
            "softmax" => OpType::Softmax,
            "max_pool" | "maxpool" => OpType::MaxPool,
            "avg_pool" | "avgpool" => OpType::AvgPool,
            "adaptive_avg_pool" => OpType::AdaptiveAvgPool,
            "add" => OpType::Add,
            "mul" => OpType::Mul,
            "concat" => OpType::Concat,
            "reshape" => OpType::Reshape,
            "flatten" => OpType::Flatten,
            "transpose" => OpType::Transpose,
            "upsample" => OpType::Upsample,
            "lstm" => OpType::Lstm,
            "" => return Err("empty operator type".to_string()),
            _ => OpType::Custom(s.to_string()),
        };
        Ok(op)
    }
}

impl TryFrom<String> for OpType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OpType> for String {
    fn from(op: OpType) -> Self {
        op.as_str().to_string()
    }
}

/// Role of a parameter tensor within its operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRole {
    Weight,
    Bias,
    Gamma,
    Beta,
    Mean,
    Var,
}

/// Parameter tensor metadata. Values live in the external tensor runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTensor {
    pub name: String,
    pub role: ParamRole,
    #[serde(default)]
    pub shape: Vec<usize>,
}

impl ParamTensor {
    pub fn new(name: impl Into<String>, role: ParamRole, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            role,
            shape,
        }
    }
}

/// Execution device assigned to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceTag {
    #[default]
    Unassigned,
    Accelerator,
    Fallback,
}

impl DeviceTag {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceTag::Unassigned => "unassigned",
            DeviceTag::Accelerator => "accelerator",
            DeviceTag::Fallback => "fallback",
        }
    }
}

impl fmt::Display for DeviceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single operation in the graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique name within the graph
    pub name: String,
    /// Operator type
    pub op_type: OpType,
    /// Parameter tensors in declaration order
    pub params: Vec<ParamTensor>,
    /// Producers, by name
    pub in_nodes: Vec<String>,
    /// Consumers, by name
    pub out_nodes: Vec<String>,
    /// Device tag stamped from the current target's assignment
    pub device: DeviceTag,
}

impl Node {
    pub fn new(name: impl Into<String>, op_type: OpType) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.normalized(),
            params: Vec::new(),
            in_nodes: Vec::new(),
            out_nodes: Vec::new(),
            device: DeviceTag::Unassigned,
        }
    }

    /// Builder-style parameter registration
    pub fn with_param(mut self, param: ParamTensor) -> Self {
        self.params.push(param);
        self
    }

    /// Convenience for the weight + bias pair carried by conv/dense ops
    pub fn with_weight_and_bias(self) -> Self {
        let weight = ParamTensor::new(format!("{}.weight", self.name), ParamRole::Weight, Vec::new());
        let bias = ParamTensor::new(format!("{}.bias", self.name), ParamRole::Bias, Vec::new());
        self.with_param(weight).with_param(bias)
    }
}
