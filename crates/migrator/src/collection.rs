//! Ordered migration container
//!
//! Iteration order is ascending by ID and is the order migrations are applied
//! in, no matter how they were collected.

use std::collections::BTreeMap;

use crate::error::{MigratorError, MigratorResult};
use crate::migration::Migration;

/// Migrations keyed and ordered by ID
#[derive(Debug, Clone, Default)]
pub struct MigrationsCollection {
    migrations: BTreeMap<String, Migration>,
}

impl MigrationsCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection, rejecting duplicate IDs
    pub fn try_from_migrations(
        migrations: impl IntoIterator<Item = Migration>,
    ) -> MigratorResult<Self> {
        let mut collection = Self::new();
        for migration in migrations {
            collection.insert(migration)?;
        }
        Ok(collection)
    }

    /// Add a migration; an ID that is already present is rejected
    pub fn insert(&mut self, migration: Migration) -> MigratorResult<()> {
        if self.migrations.contains_key(&migration.id) {
            return Err(MigratorError::DuplicateMigrationId(migration.id));
        }
        self.migrations.insert(migration.id.clone(), migration);
        Ok(())
    }

    /// Look up a migration by ID
    pub fn find(&self, id: &str) -> MigratorResult<&Migration> {
        self.migrations
            .get(id)
            .ok_or(MigratorError::MigrationIdDoesNotExist)
    }

    pub(crate) fn entry_mut(&mut self, id: &str) -> &mut Migration {
        self.migrations
            .entry(id.to_string())
            .or_insert_with(|| Migration::new(id))
    }

    /// Check whether a migration with this ID exists
    pub fn contains(&self, id: &str) -> bool {
        self.migrations.contains_key(id)
    }

    /// Check whether the collection has no migrations
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Get the number of migrations
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Migrations in ascending ID order
    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.values()
    }

    /// Migration IDs in ascending order
    pub fn ids(&self) -> Vec<&str> {
        self.migrations.keys().map(String::as_str).collect()
    }
}

impl<'a> IntoIterator for &'a MigrationsCollection {
    type Item = &'a Migration;
    type IntoIter = std::collections::btree_map::Values<'a, String, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.migrations.values()
    }
}
