//! Quantization descriptors keyed by parameter tensor or node name

use crate::error::FixqResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Fixed-point format of one quantized value.
/// Serialized as `[bit_width, fix_point]` like the compiler's quant config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(u32, Option<i32>)", into = "(u32, Option<i32>)")]
pub struct QuantDescriptor {
    pub bit_width: u32,
    /// Position of the binary point; `None` until calibration fills it in
    pub fix_point: Option<i32>,
}

impl QuantDescriptor {
    pub fn new(bit_width: u32) -> Self {
        Self {
            bit_width,
            fix_point: None,
        }
    }

    pub fn with_fix_point(mut self, fix_point: i32) -> Self {
        self.fix_point = Some(fix_point);
        self
    }
}

impl From<(u32, Option<i32>)> for QuantDescriptor {
    fn from((bit_width, fix_point): (u32, Option<i32>)) -> Self {
        Self {
            bit_width,
            fix_point,
        }
    }
}

impl From<QuantDescriptor> for (u32, Option<i32>) {
    fn from(desc: QuantDescriptor) -> Self {
        (desc.bit_width, desc.fix_point)
    }
}

/// One slot of a quant entry; `None` is the explicit not-quantized marker
pub type QuantSlot = Option<QuantDescriptor>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantSection {
    Param,
    Output,
    Input,
}

impl QuantSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantSection::Param => "param",
            QuantSection::Output => "output",
            QuantSection::Input => "input",
        }
    }
}

impl fmt::Display for QuantSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quantization configuration handed to the hardware compiler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantInfo {
    #[serde(default)]
    param: BTreeMap<String, Vec<QuantSlot>>,
    #[serde(default)]
    output: BTreeMap<String, Vec<QuantSlot>>,
    #[serde(default)]
    input: BTreeMap<String, Vec<QuantSlot>>,
}

impl QuantInfo {
    pub fn new() -> Self {
        Self::default()
    }

    fn section(&self, section: QuantSection) -> &BTreeMap<String, Vec<QuantSlot>> {
        match section {
            QuantSection::Param => &self.param,
            QuantSection::Output => &self.output,
            QuantSection::Input => &self.input,
        }
    }

    fn section_mut(&mut self, section: QuantSection) -> &mut BTreeMap<String, Vec<QuantSlot>> {
        match section {
            QuantSection::Param => &mut self.param,
            QuantSection::Output => &mut self.output,
            QuantSection::Input => &mut self.input,
        }
    }

    /// Set the slots of an entry, replacing whatever was there
    pub fn insert(&mut self, section: QuantSection, key: impl Into<String>, slots: Vec<QuantSlot>) {
        self.section_mut(section).insert(key.into(), slots);
    }

    /// Add an entry only if the key is new
    pub fn insert_if_absent(
        &mut self,
        section: QuantSection,
        key: impl Into<String>,
        slots: Vec<QuantSlot>,
    ) {
        self.section_mut(section).entry(key.into()).or_insert(slots);
    }

    pub fn get(&self, section: QuantSection, key: &str) -> Option<&[QuantSlot]> {
        self.section(section).get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, section: QuantSection, key: &str) -> bool {
        self.section(section).contains_key(key)
    }

    /// True when at least one slot of the entry is quantized
    pub fn is_quantized(&self, section: QuantSection, key: &str) -> bool {
        self.get(section, key)
            .map(|slots| slots.iter().any(Option::is_some))
            .unwrap_or(false)
    }

    /// Replace an entry's slots with not-quantized markers, keeping its length.
    /// Returns whether anything changed.
    pub fn clear(&mut self, section: QuantSection, key: &str) -> bool {
        match self.section_mut(section).get_mut(key) {
            Some(slots) if slots.iter().any(Option::is_some) => {
                let len = slots.len();
                *slots = vec![None; len];
                true
            }
            _ => false,
        }
    }

    pub fn keys(&self, section: QuantSection) -> Vec<String> {
        self.section(section).keys().cloned().collect()
    }

    pub fn len(&self, section: QuantSection) -> usize {
        self.section(section).len()
    }

    pub fn is_empty(&self) -> bool {
        self.param.is_empty() && self.output.is_empty() && self.input.is_empty()
    }

    /// Number of entries that still carry at least one descriptor
    pub fn quantized_count(&self, section: QuantSection) -> usize {
        self.section(section)
            .values()
            .filter(|slots| slots.iter().any(Option::is_some))
            .count()
    }

    pub fn to_json_value(&self) -> FixqResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> FixqResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> FixqResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
