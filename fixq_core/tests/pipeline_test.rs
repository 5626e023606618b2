// End-to-end partitioning of a described graph against on-disk artifacts
use fixq_core::compiled::{CompiledGraph, CompiledOp, OpDevice, PARTITION_MSG_ATTR};
use fixq_core::quant::{QuantInfo, QuantSection};
use fixq_core::{
    ArtifactDirCompiler, CompileTarget, FixqConfig, Graph, GraphDesc, InspectionStatus, Inspector,
};
use std::path::Path;

const MOBILE_BLOCK: &str = r#"
name: mobile_block
nodes:
  - { name: "Net::input_0", op: input }
  - name: "Net/Conv2d[stem]/input.2"
    op: conv2d
    inputs: ["Net::input_0"]
    params:
      - { name: stem.weight, role: weight, shape: [16, 3, 3, 3] }
      - { name: stem.bias, role: bias, shape: [16] }
  - name: "Net/BatchNorm2d[bn]/input.3"
    op: batch_norm
    inputs: ["Net/Conv2d[stem]/input.2"]
    params:
      - { name: bn.weight, role: gamma }
      - { name: bn.bias, role: beta }
  - { name: "Net/ReLU6[act]/input.4", op: relu6, inputs: ["Net/BatchNorm2d[bn]/input.3"] }
  - name: "Net/Linear[fc]/input.5"
    op: dense
    inputs: ["Net/ReLU6[act]/input.4"]
    params:
      - { name: fc.weight, role: weight, shape: [10, 16] }
      - { name: fc.bias, role: bias, shape: [10] }
  - { name: "Net/Softmax[head]/output", op: softmax, inputs: ["Net/Linear[fc]/input.5"] }
  - { name: "Net::output_0", op: dequant_stub, inputs: ["Net/Softmax[head]/output"] }
"#;

fn write_graph(dir: &Path) -> Graph {
    let path = dir.join("mobile_block.yaml");
    std::fs::write(&path, MOBILE_BLOCK).unwrap();
    Graph::from_desc(GraphDesc::from_file(&path).unwrap()).unwrap()
}

/// Stem block on the accelerator; fc and the head fall back to the CPU
fn partitioned_artifact() -> CompiledGraph {
    CompiledGraph::new("mobile_block")
        .with_op(CompiledOp::new("Net__input_0", "data").with_device(OpDevice::Accelerator))
        .with_op(
            CompiledOp::new("Net/Conv2d_stem_/input.2", "conv2d-fix")
                .with_device(OpDevice::Accelerator)
                .with_input("Net__input_0"),
        )
        .with_op(
            CompiledOp::new("Net/BatchNorm2d_bn_/input.3", "depthwise-conv2d-fix")
                .with_device(OpDevice::Accelerator)
                .with_input("Net/Conv2d_stem_/input.2"),
        )
        .with_op(
            CompiledOp::new("Net/ReLU6_act_/input.4", "relu6-fix")
                .with_device(OpDevice::Accelerator)
                .with_input("Net/BatchNorm2d_bn_/input.3"),
        )
        .with_op(
            CompiledOp::new("Net/ReLU6_act_/input.4_download", "download")
                .with_device(OpDevice::Fallback)
                .with_input("Net/ReLU6_act_/input.4"),
        )
        .with_op(
            CompiledOp::new("Net/Linear_fc_/input.5", "inner-product")
                .with_device(OpDevice::Fallback)
                .with_attr(PARTITION_MSG_ATTR, "inner-product exceeds bank depth;")
                .with_input("Net/ReLU6_act_/input.4_download"),
        )
        .with_op(
            CompiledOp::new("Net/Softmax_head_/output", "softmax")
                .with_device(OpDevice::Fallback)
                .with_attr(PARTITION_MSG_ATTR, "softmax is a CPU op;")
                .with_input("Net/Linear_fc_/input.5"),
        )
}

#[test]
fn test_partitioned_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let graph = write_graph(dir.path());
    assert!(graph.check_positions());

    let compiler = ArtifactDirCompiler::new(dir.path().join("compiled"));
    let target = CompileTarget::Name("DPUCZDX8G_ISA1_B4096".into());
    partitioned_artifact()
        .save_json(compiler.artifact_path(graph.name(), &target))
        .unwrap();

    let config_path = dir.path().join("fixq.yaml");
    std::fs::write(&config_path, "target: DPUCZDX8G_ISA1_B4096\n").unwrap();
    let config = FixqConfig::from_file(&config_path).unwrap();

    let report = Inspector::new(compiler).inspect(&graph, &config).unwrap();
    assert_eq!(report.status, InspectionStatus::Classified);
    assert!(!report.accelerator_pattern);
    assert_eq!(
        report.diagnostics,
        "inner-product exceeds bank depth;softmax is a CPU op;"
    );

    let stats = report.device_stats.unwrap();
    assert_eq!(stats.accelerator, 4);
    assert_eq!(stats.fallback, 2);

    let info = &report.quant_info;
    // Fused stem group stays quantized
    assert!(info.is_quantized(QuantSection::Param, "stem.weight"));
    assert!(info.is_quantized(QuantSection::Param, "bn.weight"));
    assert!(info.is_quantized(QuantSection::Output, "Net/ReLU6[act]/input.4"));
    assert!(info.is_quantized(QuantSection::Input, "Net::input_0"));

    // Fallback dense layer loses params and output, keeping slot counts
    assert_eq!(info.get(QuantSection::Param, "fc.weight"), Some(&[None][..]));
    assert_eq!(info.get(QuantSection::Param, "fc.bias"), Some(&[None][..]));
    assert_eq!(
        info.get(QuantSection::Output, "Net/Linear[fc]/input.5"),
        Some(&[None][..])
    );
    assert!(!info.is_quantized(QuantSection::Input, "Net::output_0"));

    let prune = report.prune.unwrap();
    assert_eq!(prune.params_cleared, vec!["fc.weight", "fc.bias"]);

    // Exported config reloads unchanged
    let out = dir.path().join("quant_info.json");
    info.save_json(&out).unwrap();
    assert_eq!(&QuantInfo::from_json_file(&out).unwrap(), info);
}

#[test]
fn test_missing_artifact_is_compiler_error() {
    let dir = tempfile::tempdir().unwrap();
    let graph = write_graph(dir.path());
    let inspector = Inspector::new(ArtifactDirCompiler::new(dir.path()));

    let err = inspector
        .inspect(&graph, &FixqConfig::for_target("DPUCAHX8H"))
        .unwrap_err();
    assert!(matches!(err, fixq_core::FixqError::Compiler(_)));
}

#[test]
fn test_fingerprint_selects_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let graph = write_graph(dir.path());
    let compiler = ArtifactDirCompiler::new(dir.path());

    let all_accelerated = CompiledGraph::new("mobile_block")
        .with_op(
            CompiledOp::new("Net/Conv2d_stem_/input.2", "conv2d-fix")
                .with_device(OpDevice::Accelerator),
        )
        .with_op(
            CompiledOp::new("Net/BatchNorm2d_bn_/input.3", "depthwise-conv2d-fix")
                .with_device(OpDevice::Accelerator),
        )
        .with_op(
            CompiledOp::new("Net/ReLU6_act_/input.4", "relu6-fix")
                .with_device(OpDevice::Accelerator),
        );
    let fingerprint = CompileTarget::Fingerprint("0x101000016010407".into());
    all_accelerated
        .save_json(compiler.artifact_path(graph.name(), &fingerprint))
        .unwrap();

    let mut config = FixqConfig::for_target("DPUCZDX8G_ISA1_B4096");
    config.fingerprint = Some("0x101000016010407".into());

    let report = Inspector::new(compiler).inspect(&graph, &config).unwrap();
    assert_eq!(report.target, fingerprint);
    assert!(report.accelerator_pattern);
}
