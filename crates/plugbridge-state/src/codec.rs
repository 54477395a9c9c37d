//! Structured (JSON) and binary encodings of [`State`].
//!
//! Binary layout, all little-endian:
//!
//! ```text
//! magic "PBST" | u32 version | str plugin_id | str plugin_name | i64 saved_at
//! | str format_type | u32 param_count | (u32 id, f64 value, str name)*
//! | u32 custom_count | (str key, str json_value)*
//! ```

use crate::error::{Result, StateError};
use crate::state::{FormatType, Header, State, Version};
use crate::stream::{StreamReader, StreamWriter};
use std::collections::BTreeMap;
use std::io::{Read, Write};

pub const BINARY_MAGIC: [u8; 4] = *b"PBST";

/// Smallest encodings of one parameter (id, value, empty name) and one
/// custom entry (two empty strings).
const MIN_PARAMETER_LEN: u64 = 4 + 8 + 4;
const MIN_CUSTOM_LEN: u64 = 4 + 4;

/// Encoding used for a state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Pretty-printed JSON, two-space indent.
    Json,
    Binary,
}

impl Format {
    /// Guess the format from the first bytes of an encoded snapshot.
    pub fn detect(bytes: &[u8]) -> Format {
        if bytes.starts_with(&BINARY_MAGIC) {
            Format::Binary
        } else {
            Format::Json
        }
    }
}

pub fn encode<W: Write>(state: &State, format: Format, writer: W) -> Result<()> {
    match format {
        Format::Json => write_json(state, writer),
        Format::Binary => write_binary(state, writer),
    }
}

pub fn decode<R: Read>(format: Format, reader: R) -> Result<State> {
    match format {
        Format::Json => read_json(reader),
        Format::Binary => read_binary(reader),
    }
}

pub fn write_json<W: Write>(state: &State, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, state).map_err(StateError::from_json)
}

pub fn read_json<R: Read>(reader: R) -> Result<State> {
    serde_json::from_reader(reader).map_err(StateError::from_json)
}

pub fn write_binary<W: Write>(state: &State, writer: W) -> Result<()> {
    let custom = state
        .custom_data
        .iter()
        .map(|(k, v)| Ok((k.as_str(), serde_json::to_string(v)?)))
        .collect::<Result<Vec<_>>>()?;
    let param_count = count_u32(state.parameters.len(), "parameters")?;
    let custom_count = count_u32(custom.len(), "custom entries")?;

    let header = &state.header;
    let mut w = StreamWriter::new(writer);
    w.write_u32(u32::from_le_bytes(BINARY_MAGIC))
        .write_u32(header.version.get())
        .write_str(&header.plugin_id)
        .write_str(&header.plugin_name)
        .write_i64(header.saved_at)
        .write_str(header.format_type.map(|f| f.as_str()).unwrap_or(""))
        .write_u32(param_count);
    for parameter in &state.parameters {
        w.write_parameter(parameter);
    }
    w.write_u32(custom_count);
    for (key, value) in &custom {
        w.write_str(key).write_str(value);
    }
    w.finish()?;
    Ok(())
}

pub fn read_binary<R: Read>(mut reader: R) -> Result<State> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(StateError::from)?;
    let total = bytes.len() as u64;
    let mut r = StreamReader::new(bytes.as_slice());

    let magic = r.read_u32()?.to_le_bytes();
    if magic != BINARY_MAGIC {
        return Err(StateError::Corrupt(format!("bad magic {magic:02x?}")));
    }

    let version = Version(r.read_u32()?);
    let plugin_id = r.read_string()?;
    let plugin_name = r.read_string()?;
    let saved_at = r.read_i64()?;
    let format_type = match r.read_string()?.as_str() {
        "" => None,
        other => Some(
            FormatType::parse(other)
                .ok_or_else(|| StateError::Corrupt(format!("unknown format type '{other}'")))?,
        ),
    };

    let param_count = r.read_u32()?;
    check_count(param_count, MIN_PARAMETER_LEN, total - r.bytes_read(), "parameter")?;
    let mut parameters = Vec::with_capacity(param_count as usize);
    for _ in 0..param_count {
        parameters.push(r.read_parameter()?);
    }

    let custom_count = r.read_u32()?;
    check_count(custom_count, MIN_CUSTOM_LEN, total - r.bytes_read(), "custom entry")?;
    let mut custom_data = BTreeMap::new();
    for _ in 0..custom_count {
        let key = r.read_string()?;
        let raw = r.read_string()?;
        let value = serde_json::from_str(&raw)
            .map_err(|e| StateError::Corrupt(format!("custom data '{key}': {e}")))?;
        custom_data.insert(key, value);
    }

    Ok(State {
        header: Header {
            version,
            plugin_id,
            plugin_name,
            saved_at,
            format_type,
        },
        parameters,
        custom_data,
    })
}

fn check_count(count: u32, min_len: u64, remaining: u64, what: &str) -> Result<()> {
    if u64::from(count) * min_len > remaining {
        return Err(StateError::Corrupt(format!(
            "{what} count {count} exceeds remaining {remaining} bytes"
        )));
    }
    Ok(())
}

fn count_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| StateError::Corrupt(format!("too many {what}: {len}")))
}
