//! Partition pattern validation for compiled artifacts.

use super::{CompiledGraph, CompiledOp, OpDevice, ERROR_MSG_ATTR};

/// Fallback-tagged op kinds that are legal in an accelerator pattern
const FALLBACK_CONVERSION_TYPES: &[&str] = &["fix2float", "download"];

/// Producer kinds allowed in front of a fallback `reshape-fix`
const DATA_OP_TYPES: &[&str] = &["data", "data-fix"];

/// True when the artifact runs entirely on the accelerator apart from
/// boundary conversions.
///
/// Fallback ops must be `fix2float`/`download`, or a `reshape-fix` fed
/// directly by a data op. An op with no device tag fails the check.
pub fn is_accelerator_pattern(compiled: &CompiledGraph) -> bool {
    compiled
        .ops()
        .iter()
        .all(|op| is_legal_in_pattern(compiled, op))
}

fn is_legal_in_pattern(compiled: &CompiledGraph, op: &CompiledOp) -> bool {
    match op.device() {
        None => false,
        Some(OpDevice::Fallback) => {
            if op.op_type == "reshape-fix" {
                compiled
                    .input_ops(op)
                    .first()
                    .map(|input| DATA_OP_TYPES.contains(&input.op_type.as_str()))
                    .unwrap_or(false)
            } else {
                FALLBACK_CONVERSION_TYPES.contains(&op.op_type.as_str())
            }
        }
        Some(OpDevice::Accelerator) | Some(OpDevice::User) => true,
    }
}

/// Concatenate every op's partition (or error) message
pub fn collect_partition_diagnostics(compiled: &CompiledGraph) -> String {
    compiled
        .ops()
        .iter()
        .map(CompiledOp::partition_msg)
        .collect()
}

/// True when every op carries a device tag and no error message.
/// Device tags of an artifact failing this check cannot be trusted.
pub fn is_fully_classified(compiled: &CompiledGraph) -> bool {
    compiled
        .ops()
        .iter()
        .all(|op| op.device().is_some() && !op.has_attr(ERROR_MSG_ATTR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled::{PARTITION_MSG_ATTR, DEVICE_ATTR};

    fn accelerated() -> CompiledGraph {
        CompiledGraph::new("net")
            .with_op(CompiledOp::new("input", "data-fix").with_device(OpDevice::User))
            .with_op(
                CompiledOp::new("conv", "conv2d-fix")
                    .with_device(OpDevice::Accelerator)
                    .with_input("input"),
            )
            .with_op(
                CompiledOp::new("conv_fix2float", "fix2float")
                    .with_device(OpDevice::Fallback)
                    .with_input("conv"),
            )
            .with_op(
                CompiledOp::new("output", "download")
                    .with_device(OpDevice::Fallback)
                    .with_input("conv_fix2float"),
            )
    }

    #[test]
    fn test_valid_pattern() {
        let compiled = accelerated();
        assert!(is_accelerator_pattern(&compiled));
        assert!(is_fully_classified(&compiled));
        assert_eq!(collect_partition_diagnostics(&compiled), "");
    }

    #[test]
    fn test_fallback_arithmetic_fails() {
        let mut compiled = accelerated();
        compiled.add_op(
            CompiledOp::new("softmax", "softmax")
                .with_device(OpDevice::Fallback)
                .with_attr(PARTITION_MSG_ATTR, "softmax is not supported by DPU")
                .with_input("conv"),
        );
        assert!(!is_accelerator_pattern(&compiled));
        assert!(!collect_partition_diagnostics(&compiled).is_empty());
    }

    #[test]
    fn test_missing_device_fails() {
        let compiled = accelerated().with_op(CompiledOp::new("pad", "pad-fix"));
        assert!(!is_accelerator_pattern(&compiled));
        assert!(!is_fully_classified(&compiled));
    }

    #[test]
    fn test_reshape_fed_by_data() {
        let compiled = CompiledGraph::new("net")
            .with_op(CompiledOp::new("input", "data").with_device(OpDevice::User))
            .with_op(
                CompiledOp::new("reshape", "reshape-fix")
                    .with_device(OpDevice::Fallback)
                    .with_input("input"),
            );
        assert!(is_accelerator_pattern(&compiled));

        let compiled = accelerated().with_op(
            CompiledOp::new("reshape", "reshape-fix")
                .with_device(OpDevice::Fallback)
                .with_input("conv"),
        );
        assert!(!is_accelerator_pattern(&compiled));
    }

    #[test]
    fn test_reshape_without_inputs_fails() {
        let compiled = CompiledGraph::new("net").with_op(
            CompiledOp::new("reshape", "reshape-fix").with_device(OpDevice::Fallback),
        );
        assert!(!is_accelerator_pattern(&compiled));
    }

    #[test]
    fn test_error_message_blocks_classification() {
        let compiled = accelerated().with_op(
            CompiledOp::new("bad", "conv2d-fix")
                .with_attr(DEVICE_ATTR, "DPU")
                .with_attr(ERROR_MSG_ATTR, "kernel too large"),
        );
        assert!(!is_fully_classified(&compiled));
        assert_eq!(collect_partition_diagnostics(&compiled), "kernel too large");
    }
}
