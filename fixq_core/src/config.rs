/// Configuration file support for fixq
///
/// Quantization passes are driven by a `FixqConfig` loaded from YAML, TOML or
/// JSON. Target selection can be overridden from the environment.
use crate::compiled::CompileTarget;
use crate::error::{FixqError, FixqResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Overrides the configured target name
pub const ENV_TARGET: &str = "FIXQ_TARGET";
/// Overrides the configured hardware fingerprint
pub const ENV_FINGERPRINT: &str = "FIXQ_FINGERPRINT";
/// Enables compiled-artifact dumps ("1"/"true"/"yes")
pub const ENV_INSPECT_DEBUG: &str = "FIXQ_INSPECT_DEBUG";

/// Network family being quantized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Cnn,
    Rnn,
}

/// Bit widths assigned to the baseline quant config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantStrategy {
    #[serde(default = "default_bits")]
    pub weight_bits: u32,
    #[serde(default = "default_bits")]
    pub bias_bits: u32,
    #[serde(default = "default_bits")]
    pub activation_bits: u32,
    #[serde(default = "default_bits")]
    pub input_bits: u32,
}

fn default_bits() -> u32 {
    8
}

impl Default for QuantStrategy {
    fn default() -> Self {
        Self {
            weight_bits: default_bits(),
            bias_bits: default_bits(),
            activation_bits: default_bits(),
            input_bits: default_bits(),
        }
    }
}

fn default_debug_dir() -> PathBuf {
    PathBuf::from("quantize_result")
}

/// Quantization pass configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixqConfig {
    /// Named compilation target
    #[serde(default)]
    pub target: Option<String>,

    /// Hardware fingerprint; wins over `target` when both are set
    #[serde(default)]
    pub fingerprint: Option<String>,

    #[serde(default)]
    pub model_type: ModelType,

    /// Quantize LSTM gate non-linearities even for non-recurrent model types
    #[serde(default)]
    pub lstm: bool,

    /// Extra operator type names treated as quantizable
    #[serde(default)]
    pub custom_quant_ops: HashSet<String>,

    #[serde(default)]
    pub strategy: QuantStrategy,

    /// Dump compiled artifacts to `debug_dir`
    #[serde(default)]
    pub inspect_debug: bool,

    #[serde(default = "default_debug_dir")]
    pub debug_dir: PathBuf,
}

impl Default for FixqConfig {
    fn default() -> Self {
        Self {
            target: None,
            fingerprint: None,
            model_type: ModelType::default(),
            lstm: false,
            custom_quant_ops: HashSet::new(),
            strategy: QuantStrategy::default(),
            inspect_debug: false,
            debug_dir: default_debug_dir(),
        }
    }
}

impl FixqConfig {
    /// Config for a named target with default settings
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Default::default()
        }
    }

    /// Load config from a file (auto-detect format)
    pub fn from_file<P: AsRef<Path>>(path: P) -> FixqResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FixqError::config(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str());
        match extension {
            Some("toml") => Self::from_toml(&contents),
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Parse config from YAML string
    pub fn from_yaml(contents: &str) -> FixqResult<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| FixqError::config(format!("Failed to parse YAML: {}", e)))
    }

    /// Parse config from TOML string
    pub fn from_toml(contents: &str) -> FixqResult<Self> {
        toml::from_str(contents)
            .map_err(|e| FixqError::config(format!("Failed to parse TOML: {}", e)))
    }

    /// Parse config from JSON string
    pub fn from_json(contents: &str) -> FixqResult<Self> {
        serde_json::from_str(contents)
            .map_err(|e| FixqError::config(format!("Failed to parse JSON: {}", e)))
    }

    /// Write config as YAML
    pub fn save_yaml<P: AsRef<Path>>(&self, path: P) -> FixqResult<()> {
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Find and load config file from standard search paths
    ///
    /// Search order:
    /// 1. ./fixq.yaml, ./fixq.yml or ./fixq.toml
    /// 2. ~/.fixq/config.yaml, ~/.fixq/config.yml or ~/.fixq/config.toml
    pub fn find_and_load() -> FixqResult<Self> {
        for path in Self::get_search_paths() {
            if path.exists() {
                log::info!("Loading fixq config from {}", path.display());
                let mut config = Self::from_file(&path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        Err(FixqError::config("No config file found in standard locations"))
    }

    /// Get standard config file search paths
    pub fn get_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("fixq.yaml"),
            PathBuf::from("fixq.yml"),
            PathBuf::from("fixq.toml"),
        ];

        if let Some(home) = dirs::home_dir() {
            let fixq_dir = home.join(".fixq");
            paths.push(fixq_dir.join("config.yaml"));
            paths.push(fixq_dir.join("config.yml"));
            paths.push(fixq_dir.join("config.toml"));
        }

        paths
    }

    /// Apply `FIXQ_TARGET`, `FIXQ_FINGERPRINT` and `FIXQ_INSPECT_DEBUG`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(target) = lookup(ENV_TARGET).filter(|v| !v.is_empty()) {
            log::debug!("{} overrides target with '{}'", ENV_TARGET, target);
            self.target = Some(target);
        }
        if let Some(fp) = lookup(ENV_FINGERPRINT).filter(|v| !v.is_empty()) {
            log::debug!("{} overrides fingerprint with '{}'", ENV_FINGERPRINT, fp);
            self.fingerprint = Some(fp);
        }
        if let Some(flag) = lookup(ENV_INSPECT_DEBUG) {
            self.inspect_debug = matches!(
                flag.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// Target handed to the hardware compiler
    pub fn compile_target(&self) -> FixqResult<CompileTarget> {
        CompileTarget::resolve(self.target.as_deref(), self.fingerprint.as_deref())
    }

    /// Recurrent models always quantize their gates
    pub fn is_lstm(&self) -> bool {
        self.lstm || self.model_type == ModelType::Rnn
    }
}
