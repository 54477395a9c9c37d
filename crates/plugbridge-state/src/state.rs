//! Persisted state model.
//!
//! A [`State`] is a snapshot of one plugin instance: a [`Header`] identifying
//! the plugin and format version, an ordered parameter list and an open map
//! of custom data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Version of a plugin's state format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(pub u32);

impl Version {
    pub const UNKNOWN: Version = Version(0);
    pub const V1: Version = Version(1);
    pub const V2: Version = Version(2);
    pub const V3: Version = Version(3);

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Version {
        Version(self.0.saturating_add(1))
    }
}

impl From<u32> for Version {
    fn from(v: u32) -> Self {
        Version(v)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    Preset,
    Project,
    Duplicate,
}

impl FormatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatType::Preset => "preset",
            FormatType::Project => "project",
            FormatType::Duplicate => "duplicate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preset" => Some(FormatType::Preset),
            "project" => Some(FormatType::Project),
            "duplicate" => Some(FormatType::Duplicate),
            _ => None,
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub version: Version,
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub plugin_name: String,
    /// Unix timestamp in seconds; 0 means unknown.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub saved_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_type: Option<FormatType>,
}

impl Header {
    pub fn new(plugin_id: impl Into<String>, version: Version) -> Self {
        Self {
            version,
            plugin_id: plugin_id.into(),
            plugin_name: String::new(),
            saved_at: 0,
            format_type: None,
        }
    }

    pub fn plugin_name(mut self, name: impl Into<String>) -> Self {
        self.plugin_name = name.into();
        self
    }

    pub fn saved_at(mut self, timestamp: i64) -> Self {
        self.saved_at = timestamp;
        self
    }

    pub fn format_type(mut self, format_type: FormatType) -> Self {
        self.format_type = Some(format_type);
        self
    }

    /// Stamp with the current wall-clock time.
    pub fn stamped(self) -> Self {
        self.saved_at(unix_now())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: u32,
    #[serde(with = "param_value")]
    pub value: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Parameter {
    pub fn new(id: u32, value: f64) -> Self {
        Self {
            id,
            value,
            name: String::new(),
        }
    }

    pub fn named(id: u32, value: f64, name: impl Into<String>) -> Self {
        Self {
            id,
            value,
            name: name.into(),
        }
    }
}

/// JSON has no literal for non-finite numbers, so those travel as
/// `"inf"`, `"-inf"` and `"nan"`.
mod param_value {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value == f64::INFINITY {
            serializer.serialize_str("inf")
        } else if *value == f64::NEG_INFINITY {
            serializer.serialize_str("-inf")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }

    struct ValueVisitor;

    impl Visitor<'_> for ValueVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or one of \"inf\", \"-inf\", \"nan\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub header: Header,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: BTreeMap<String, Value>,
}

impl State {
    pub fn new(header: Header) -> Self {
        Self {
            header,
            parameters: Vec::new(),
            custom_data: BTreeMap::new(),
        }
    }

    pub fn version(&self) -> Version {
        self.header.version
    }

    pub fn plugin_id(&self) -> &str {
        &self.header.plugin_id
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_data.insert(key.into(), value.into());
        self
    }

    pub fn parameter(&self, id: u32) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.id == id)
    }

    pub fn value(&self, id: u32) -> Option<f64> {
        self.parameter(id).map(|p| p.value)
    }

    /// Update an existing parameter or append a new one.
    pub fn set_value(&mut self, id: u32, value: f64) {
        match self.parameters.iter_mut().find(|p| p.id == id) {
            Some(p) => p.value = value,
            None => self.parameters.push(Parameter::new(id, value)),
        }
    }

    pub fn custom(&self, key: &str) -> Option<&Value> {
        self.custom_data.get(key)
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
