//! Migration loaders
//!
//! Turn a set of named Lua scripts into a [`MigrationsCollection`]. Loading is
//! fail-fast: one malformed name aborts the whole load.

mod embedded;
mod file;
mod fs;

pub use embedded::EmbeddedLoader;
pub use file::{
    Direction, MigrationFile, EXCLUDED_PREFIX, MIGRATION_FILE_SUFFIX_DOWN,
    MIGRATION_FILE_SUFFIX_UP,
};
pub use fs::FsLoader;

use std::sync::Arc;

use crate::collection::MigrationsCollection;
use crate::error::MigratorResult;
use crate::migration::LuaScript;

/// Source of migrations
pub trait MigrationSource {
    fn load_migrations(&self) -> MigratorResult<MigrationsCollection>;
}

/// Bind a script to the matching direction of its migration
fn bind_script(collection: &mut MigrationsCollection, file: &MigrationFile, contents: String) {
    let migration = collection.entry_mut(&file.id);
    match file.direction {
        Direction::Up => migration.migrate = Some(Arc::new(LuaScript::new(contents))),
        Direction::Down => migration.rollback = Some(Arc::new(LuaScript::new(contents))),
    }
}
