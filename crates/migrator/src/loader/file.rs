//! Migration file names
//!
//! Files follow `<id>.<direction>.<ext>`, e.g. `202410082345_users.up.lua`.

use crate::error::{MigratorError, MigratorResult};

pub const MIGRATION_FILE_SUFFIX_UP: &str = "up";
pub const MIGRATION_FILE_SUFFIX_DOWN: &str = "down";
/// Files starting with this marker are ignored by loaders
pub const EXCLUDED_PREFIX: &str = "--";

/// Which function of a migration a file provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply the migration
    Up,
    /// Roll the migration back
    Down,
}

impl Direction {
    /// File name segment for this direction
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => MIGRATION_FILE_SUFFIX_UP,
            Direction::Down => MIGRATION_FILE_SUFFIX_DOWN,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed migration file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub id: String,
    pub direction: Direction,
    pub extension: String,
}

impl MigrationFile {
    /// Parse `<id>.<direction>.<ext>`
    pub fn parse(file_name: &str) -> MigratorResult<Self> {
        let parts: Vec<&str> = file_name.splitn(3, '.').collect();
        if parts.len() < 3 {
            return Err(MigratorError::WrongFileFormat(file_name.to_string()));
        }

        let direction = match parts[1] {
            MIGRATION_FILE_SUFFIX_UP => Direction::Up,
            MIGRATION_FILE_SUFFIX_DOWN => Direction::Down,
            _ => return Err(MigratorError::WrongDirectionFormat(file_name.to_string())),
        };

        Ok(Self {
            id: parts[0].to_string(),
            direction,
            extension: parts[2].to_string(),
        })
    }

    /// Whether loaders should skip this file
    pub fn is_excluded(file_name: &str) -> bool {
        file_name.starts_with(EXCLUDED_PREFIX)
    }

    /// File name this entry was parsed from
    pub fn file_name(&self) -> String {
        format!("{}.{}.{}", self.id, self.direction, self.extension)
    }
}
