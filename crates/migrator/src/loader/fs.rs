use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::collection::MigrationsCollection;
use crate::error::{MigratorError, MigratorResult};

use super::{bind_script, Direction, MigrationFile, MigrationSource};

/// Loader over a directory of `<id>.<up|down>.<ext>` files
#[derive(Debug, Clone)]
pub struct FsLoader {
    dir: PathBuf,
}

impl FsLoader {
    /// Create a loader over a directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the migrations directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create an up/down script pair for a new migration and return its ID
    pub fn create_migration(&self, name: &str) -> MigratorResult<String> {
        let slug = name
            .trim()
            .to_lowercase()
            .replace(|c: char| c.is_whitespace() || c == '-' || c == '.', "_");
        if slug.is_empty() {
            return Err(MigratorError::MissingId);
        }

        fs::create_dir_all(&self.dir).map_err(|e| MigratorError::io(&self.dir, e))?;

        let id = format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S"), slug);
        for direction in [Direction::Up, Direction::Down] {
            let file = MigrationFile {
                id: id.clone(),
                direction,
                extension: "lua".to_string(),
            };
            let path = self.dir.join(file.file_name());
            let mut handle = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|e| MigratorError::io(&path, e))?;
            handle
                .write_all(migration_template(name, &id, direction).as_bytes())
                .map_err(|e| MigratorError::io(&path, e))?;
        }

        tracing::debug!(migration_id = %id, dir = %self.dir.display(), "created migration scripts");
        Ok(id)
    }
}

impl MigrationSource for FsLoader {
    fn load_migrations(&self) -> MigratorResult<MigrationsCollection> {
        let entries = fs::read_dir(&self.dir).map_err(|e| MigratorError::io(&self.dir, e))?;

        let mut collection = MigrationsCollection::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigratorError::io(&self.dir, e))?;
            let path = entry.path();

            let file_type = entry.file_type().map_err(|e| MigratorError::io(&path, e))?;
            if file_type.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if MigrationFile::is_excluded(&name) {
                continue;
            }

            let file = MigrationFile::parse(&name)?;
            let contents = fs::read_to_string(&path).map_err(|e| MigratorError::io(&path, e))?;
            bind_script(&mut collection, &file, contents);
        }

        Ok(collection)
    }
}

fn migration_template(name: &str, id: &str, direction: Direction) -> String {
    let body = match direction {
        Direction::Up => "-- Add your schema changes here",
        Direction::Down => "-- Add rollback statements here",
    };
    format!(
        "-- Migration: {}\n\
         -- ID: {}\n\
         -- Direction: {}\n\
         -- Created: {}\n\n\
         {}\n",
        name,
        id,
        direction,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        body
    )
}
