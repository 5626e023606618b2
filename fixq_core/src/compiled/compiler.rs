//! Hardware compiler boundary
//!
//! The toolchain itself is external. The core only submits a graph together
//! with a target descriptor and reads back a [`CompiledGraph`]. The call is
//! blocking with no internal timeout and is never retried here.

use super::CompiledGraph;
use crate::error::{FixqError, FixqResult};
use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// What the hardware compiler should compile for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileTarget {
    /// Named target, e.g. "DPUCZDX8G_ISA1_B4096"
    Name(String),
    /// Hardware fingerprint, e.g. "0x101000016010407"
    Fingerprint(String),
}

impl CompileTarget {
    pub fn as_str(&self) -> &str {
        match self {
            CompileTarget::Name(name) => name,
            CompileTarget::Fingerprint(fp) => fp,
        }
    }

    /// Fingerprint wins over a target name when both are configured
    pub fn resolve(name: Option<&str>, fingerprint: Option<&str>) -> FixqResult<Self> {
        match (fingerprint, name) {
            (Some(fp), _) if !fp.is_empty() => Ok(CompileTarget::Fingerprint(fp.to_string())),
            (_, Some(name)) if !name.is_empty() => Ok(CompileTarget::Name(name.to_string())),
            _ => Err(FixqError::config(
                "either a target name or a hardware fingerprint is required",
            )),
        }
    }
}

impl fmt::Display for CompileTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileTarget::Name(name) => write!(f, "{}", name),
            CompileTarget::Fingerprint(fp) => write!(f, "fingerprint:{}", fp),
        }
    }
}

/// External toolchain that lowers a graph into a compiled artifact
pub trait HardwareCompiler {
    fn compile(&self, graph: &Graph, target: &CompileTarget) -> FixqResult<CompiledGraph>;
}

/// Compiler adapter reading artifacts that the toolchain already wrote to disk.
///
/// Artifacts are looked up as `<dir>/<graph name>_<target>.json`.
#[derive(Debug, Clone)]
pub struct ArtifactDirCompiler {
    dir: PathBuf,
}

impl ArtifactDirCompiler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, graph_name: &str, target: &CompileTarget) -> PathBuf {
        artifact_path(&self.dir, graph_name, target)
    }
}

impl HardwareCompiler for ArtifactDirCompiler {
    fn compile(&self, graph: &Graph, target: &CompileTarget) -> FixqResult<CompiledGraph> {
        let path = self.artifact_path(graph.name(), target);
        if !path.exists() {
            return Err(FixqError::compiler(format!(
                "no compiled artifact for target {} at {}",
                target,
                path.display()
            )));
        }
        log::info!("Loading compiled artifact {}", path.display());
        CompiledGraph::from_json_file(&path)
    }
}

/// File name convention shared by the artifact reader and debug dumps
pub fn artifact_path(dir: &Path, graph_name: &str, target: &CompileTarget) -> PathBuf {
    let file_name = format!("{}_{}.json", graph_name, target.as_str()).replace('/', "_");
    dir.join(file_name)
}
