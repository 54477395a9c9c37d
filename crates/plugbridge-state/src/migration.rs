//! Version-to-version state migration.

use crate::error::{Result, StateError};
use crate::state::{State, Version};
use std::fmt;
use std::sync::Arc;

/// Transforms a state from one declared format version to a newer one.
pub trait Migrator: Send + Sync {
    fn source_version(&self) -> Version;

    fn target_version(&self) -> Version;

    fn migrate(&self, state: State) -> Result<State>;
}

/// A [`Migrator`] backed by a closure.
pub struct SimpleMigrator<F> {
    source: Version,
    target: Version,
    transform: F,
}

impl<F> SimpleMigrator<F>
where
    F: Fn(State) -> Result<State> + Send + Sync,
{
    pub fn new(source: Version, target: Version, transform: F) -> Self {
        Self {
            source,
            target,
            transform,
        }
    }
}

impl<F> Migrator for SimpleMigrator<F>
where
    F: Fn(State) -> Result<State> + Send + Sync,
{
    fn source_version(&self) -> Version {
        self.source
    }

    fn target_version(&self) -> Version {
        self.target
    }

    fn migrate(&self, state: State) -> Result<State> {
        (self.transform)(state)
    }
}

/// Ordered set of migrators, at most one per source version.
#[derive(Clone, Default)]
pub struct MigrationChain {
    migrators: Vec<Arc<dyn Migrator>>,
}

impl MigrationChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migrator. A migrator for an already covered source version
    /// replaces the earlier one.
    pub fn add<M: Migrator + 'static>(&mut self, migrator: M) -> Result<&mut Self> {
        let from = migrator.source_version();
        let target = migrator.target_version();
        if target <= from {
            return Err(StateError::InvalidMigrator { from, target });
        }

        let migrator: Arc<dyn Migrator> = Arc::new(migrator);
        match self
            .migrators
            .iter_mut()
            .find(|m| m.source_version() == from)
        {
            Some(slot) => {
                tracing::warn!("Replacing migrator for state version {}", from);
                *slot = migrator;
            }
            None => self.migrators.push(migrator),
        }
        Ok(self)
    }

    /// Builder form of [`add`](Self::add).
    pub fn with<M: Migrator + 'static>(mut self, migrator: M) -> Result<Self> {
        self.add(migrator)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.migrators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrators.is_empty()
    }

    pub fn find(&self, source: Version) -> Option<&dyn Migrator> {
        self.migrators
            .iter()
            .find(|m| m.source_version() == source)
            .map(|m| m.as_ref())
    }

    /// Step the state forward until its version reaches `target`.
    ///
    /// Every step needs a migrator whose source equals the current version;
    /// a gap fails with [`StateError::NoMigratorFound`]. The header version is
    /// set to each migrator's declared target after it runs. A migrator may
    /// overshoot `target`, in which case the result is newer than requested.
    pub fn migrate(&self, mut state: State, target: Version) -> Result<State> {
        while state.header.version < target {
            let from = state.header.version;
            let migrator = self.find(from).ok_or(StateError::NoMigratorFound(from))?;
            let to = migrator.target_version();

            let mut next = migrator
                .migrate(state)
                .map_err(|e| StateError::MigrationFailed {
                    from,
                    to,
                    source: Box::new(e),
                })?;
            next.header.version = to;

            tracing::debug!("Migrated state {} from version {} to {}", next.header.plugin_id, from, to);
            state = next;
        }
        Ok(state)
    }
}

impl fmt::Debug for MigrationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.migrators
                    .iter()
                    .map(|m| (m.source_version().get(), m.target_version().get())),
            )
            .finish()
    }
}
