//! Named parameter snapshots.
//!
//! A preset keys parameter values by parameter name (or `param_<id>` for
//! unnamed parameters) so files stay readable and survive id renumbering.

use crate::error::{Result, StateError};
use crate::manager::StateManager;
use crate::state::Parameter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl PresetMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub metadata: PresetMetadata,
    pub preset_data: BTreeMap<String, Value>,
}

fn preset_key(parameter: &Parameter) -> String {
    if parameter.name.is_empty() {
        format!("param_{}", parameter.id)
    } else {
        parameter.name.clone()
    }
}

impl Preset {
    /// Resolve stored values against the plugin's known parameters.
    ///
    /// Keys match a known parameter's name first, then the `param_<id>`
    /// form. Non-numeric values and unmatched keys are skipped; they remain
    /// available through [`preset_data`](Self::preset_data).
    pub fn parameters(&self, known: &[Parameter]) -> Vec<Parameter> {
        self.preset_data
            .iter()
            .filter_map(|(key, value)| {
                let value = value.as_f64()?;
                let id = known
                    .iter()
                    .find(|p| !p.name.is_empty() && p.name == *key)
                    .map(|p| p.id)
                    .or_else(|| key.strip_prefix("param_")?.parse().ok())?;
                let name = known
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                Some(Parameter { id, value, name })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetBank {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default)]
    pub presets: Vec<Preset>,
}

impl PresetBank {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, preset: Preset) {
        self.presets.push(preset);
    }

    pub fn find(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.metadata.name == name)
    }
}

impl StateManager {
    /// Build a preset from parameter values and extra custom entries.
    ///
    /// The metadata version defaults to the plugin name when left empty.
    pub fn create_preset(
        &self,
        mut metadata: PresetMetadata,
        parameters: &[Parameter],
        custom_data: BTreeMap<String, Value>,
    ) -> Result<Preset> {
        if metadata.name.trim().is_empty() {
            return Err(StateError::EmptyPresetName);
        }

        let mut preset_data = BTreeMap::new();
        for parameter in parameters {
            preset_data.insert(preset_key(parameter), Value::from(parameter.value));
        }
        preset_data.extend(custom_data);

        if preset_data.is_empty() {
            return Err(StateError::EmptyPresetData);
        }
        if metadata.version.is_empty() {
            metadata.version = self.plugin_name().to_string();
        }

        Ok(Preset {
            metadata,
            preset_data,
        })
    }

    pub fn save_preset(&self, preset: &Preset) -> Result<Vec<u8>> {
        check_preset(preset)?;
        Ok(serde_json::to_vec_pretty(preset)?)
    }

    pub fn load_preset(&self, bytes: &[u8]) -> Result<Preset> {
        let preset: Preset = serde_json::from_slice(bytes).map_err(StateError::from_json)?;
        check_preset(&preset)?;
        Ok(preset)
    }

    /// Write through a sibling temp file and rename, creating parent directories.
    pub fn save_preset_file(&self, path: impl AsRef<Path>, preset: &Preset) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.save_preset(preset)?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;

        tracing::info!("Saved preset '{}' to {}", preset.metadata.name, path.display());
        Ok(())
    }

    pub fn load_preset_file(&self, path: impl AsRef<Path>) -> Result<Preset> {
        let bytes = fs::read(path.as_ref())?;
        self.load_preset(&bytes)
    }

    pub fn save_bank(&self, bank: &PresetBank) -> Result<Vec<u8>> {
        for preset in &bank.presets {
            check_preset(preset)?;
        }
        Ok(serde_json::to_vec_pretty(bank)?)
    }

    pub fn load_bank(&self, bytes: &[u8]) -> Result<PresetBank> {
        let bank: PresetBank = serde_json::from_slice(bytes).map_err(StateError::from_json)?;
        for preset in &bank.presets {
            check_preset(preset)?;
        }
        Ok(bank)
    }
}

fn check_preset(preset: &Preset) -> Result<()> {
    if preset.metadata.name.trim().is_empty() {
        return Err(StateError::EmptyPresetName);
    }
    if preset.preset_data.is_empty() {
        return Err(StateError::EmptyPresetData);
    }
    Ok(())
}
