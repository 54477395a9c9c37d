//! Validation, (de)serialization and migration for one plugin's state.

use crate::cancel::{CancelToken, CancellableReader, CancellableWriter, DEFAULT_CHUNK_SIZE};
use crate::codec::{self, Format};
use crate::error::{Result, StateError};
use crate::migration::MigrationChain;
use crate::state::{FormatType, Header, Parameter, State, Version};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use std::time::Duration;

/// Default bound on background state operations.
pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the identity, supported version range and migrations of a plugin's
/// persisted state.
///
/// Loads run the migration chain when the stored version is older than
/// [`max_version`](Self::max_version), then validate. Saves validate before
/// encoding. State I/O belongs on the main thread, never in `process`.
#[derive(Debug, Clone)]
pub struct StateManager {
    plugin_id: String,
    plugin_name: String,
    max_version: Version,
    migrations: MigrationChain,
    chunk_size: usize,
    timeout: Duration,
}

impl StateManager {
    pub fn new(
        plugin_id: impl Into<String>,
        plugin_name: impl Into<String>,
        max_version: Version,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            plugin_name: plugin_name.into(),
            max_version,
            migrations: MigrationChain::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: DEFAULT_STATE_TIMEOUT,
        }
    }

    pub fn with_migrations(mut self, migrations: MigrationChain) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn max_version(&self) -> Version {
        self.max_version
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn migrations(&self) -> &MigrationChain {
        &self.migrations
    }

    pub fn migrations_mut(&mut self) -> &mut MigrationChain {
        &mut self.migrations
    }

    /// A fresh project snapshot stamped with this manager's identity and the current time.
    pub fn new_state(&self, parameters: Vec<Parameter>) -> State {
        State {
            header: Header::new(self.plugin_id.clone(), self.max_version)
                .plugin_name(self.plugin_name.clone())
                .format_type(FormatType::Project)
                .stamped(),
            parameters,
            custom_data: BTreeMap::new(),
        }
    }

    /// Checks plugin id, then version, then parameter id uniqueness.
    pub fn validate(&self, state: &State) -> Result<()> {
        self.check_plugin_id(state)?;

        if state.header.version > self.max_version {
            return Err(StateError::VersionTooNew {
                version: state.header.version,
                max: self.max_version,
            });
        }

        let mut seen = HashSet::with_capacity(state.parameters.len());
        for parameter in &state.parameters {
            if !seen.insert(parameter.id) {
                return Err(StateError::DuplicateParameter(parameter.id));
            }
        }
        Ok(())
    }

    fn check_plugin_id(&self, state: &State) -> Result<()> {
        if state.header.plugin_id != self.plugin_id {
            return Err(StateError::InvalidPluginId {
                expected: self.plugin_id.clone(),
                found: state.header.plugin_id.clone(),
            });
        }
        Ok(())
    }

    /// Identity check, migration up to `max_version` when needed, then full validation.
    pub fn upgrade(&self, state: State) -> Result<State> {
        self.check_plugin_id(&state)?;
        let state = if state.header.version < self.max_version && !self.migrations.is_empty() {
            self.migrations.migrate(state, self.max_version)?
        } else {
            state
        };
        self.validate(&state)?;
        Ok(state)
    }

    pub fn write_to<W: Write>(&self, state: &State, format: Format, writer: W) -> Result<()> {
        self.validate(state)?;
        codec::encode(state, format, writer)
    }

    pub fn read_from<R: Read>(&self, reader: R, format: Format) -> Result<State> {
        let state = codec::decode(format, reader).inspect_err(|e| {
            tracing::warn!("Failed to decode state for {}: {}", self.plugin_id, e);
        })?;
        self.upgrade(state)
    }

    pub fn save(&self, state: &State, format: Format) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(state, format, &mut bytes)?;
        Ok(bytes)
    }

    pub fn load(&self, bytes: &[u8], format: Format) -> Result<State> {
        self.read_from(bytes, format)
    }

    /// Load, picking the format from the binary magic.
    pub fn load_auto(&self, bytes: &[u8]) -> Result<State> {
        self.load(bytes, Format::detect(bytes))
    }

    pub fn save_json(&self, state: &State) -> Result<Vec<u8>> {
        self.save(state, Format::Json)
    }

    pub fn load_json(&self, bytes: &[u8]) -> Result<State> {
        self.load(bytes, Format::Json)
    }

    pub fn save_binary(&self, state: &State) -> Result<Vec<u8>> {
        self.save(state, Format::Binary)
    }

    pub fn load_binary(&self, bytes: &[u8]) -> Result<State> {
        self.load(bytes, Format::Binary)
    }

    /// Save, checking `token` before starting and once per chunk.
    ///
    /// The snapshot is encoded in memory first, so a cancelled save leaves
    /// at most a prefix of whole chunks in `writer` and always reports
    /// [`StateError::Cancelled`] or [`StateError::Timeout`].
    pub fn save_with_cancel<W: Write>(
        &self,
        state: &State,
        format: Format,
        writer: W,
        token: &CancelToken,
    ) -> Result<()> {
        token.check()?;
        let bytes = self.save(state, format)?;
        let mut out = CancellableWriter::new(writer, token, self.chunk_size);
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(())
    }

    /// Load, checking `token` before starting and once per chunk.
    pub fn load_with_cancel<R: Read>(
        &self,
        reader: R,
        format: Format,
        token: &CancelToken,
    ) -> Result<State> {
        token.check()?;
        let mut bytes = Vec::new();
        CancellableReader::new(reader, token, self.chunk_size).read_to_end(&mut bytes)?;
        token.check()?;
        self.load(&bytes, format)
    }

    /// Compact binary blob for custom data entries.
    pub fn encode_blob<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    pub fn decode_blob<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }
}
