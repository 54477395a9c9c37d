//! Static identity of a plugin type.

use serde::{Deserialize, Serialize};

/// Common feature tags.
pub mod features {
    pub const INSTRUMENT: &str = "instrument";
    pub const AUDIO_EFFECT: &str = "audio-effect";
    pub const NOTE_EFFECT: &str = "note-effect";
    pub const ANALYZER: &str = "analyzer";
    pub const UTILITY: &str = "utility";
    pub const MONO: &str = "mono";
    pub const STEREO: &str = "stereo";
}

/// Plugin descriptor exposed during discovery.
///
/// Immutable once registered; the id must be unique within a registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique plugin ID, reverse-DNS style
    pub id: String,

    /// Human-readable name
    pub name: String,

    #[serde(default)]
    pub vendor: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub manual_url: String,

    #[serde(default)]
    pub support_url: String,

    pub version: String,

    #[serde(default)]
    pub description: String,

    /// Feature tags, see [`features`]
    #[serde(default)]
    pub features: Vec<String>,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: "1.0.0".to_string(),
            ..Self::default()
        }
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn manual_url(mut self, url: impl Into<String>) -> Self {
        self.manual_url = url.into();
        self
    }

    pub fn support_url(mut self, url: impl Into<String>) -> Self {
        self.support_url = url.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}
