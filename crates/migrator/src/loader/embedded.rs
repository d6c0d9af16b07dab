use crate::collection::MigrationsCollection;
use crate::error::MigratorResult;

use super::{bind_script, MigrationFile, MigrationSource};

/// Loader over scripts compiled into the binary
///
/// ```ignore
/// static MIGRATIONS: &[(&str, &str)] = &[
///     ("202410082345_users.up.lua", include_str!("../migrations/202410082345_users.up.lua")),
///     ("202410082345_users.down.lua", include_str!("../migrations/202410082345_users.down.lua")),
/// ];
/// let migrations = EmbeddedLoader::new(MIGRATIONS).load_migrations()?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedLoader {
    files: &'static [(&'static str, &'static str)],
}

impl EmbeddedLoader {
    /// Create a loader over `(file name, contents)` pairs
    pub fn new(files: &'static [(&'static str, &'static str)]) -> Self {
        Self { files }
    }
}

impl MigrationSource for EmbeddedLoader {
    fn load_migrations(&self) -> MigratorResult<MigrationsCollection> {
        let mut collection = MigrationsCollection::new();
        for (name, contents) in self.files {
            if MigrationFile::is_excluded(name) {
                continue;
            }
            let file = MigrationFile::parse(name)?;
            bind_script(&mut collection, &file, contents.to_string());
        }
        Ok(collection)
    }
}
