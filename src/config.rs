//! Connection parameters and job options.

use anyhow::{bail, Result};
use std::fmt;

use crate::safety::{validate_destination, validate_identifier};
use crate::schema::{AWARD_TABLE, DEST_TABLE, TRACK_TABLE};

/// Rows per committed batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Fixed connection parameters, supplied from outside the job.
#[derive(Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub user: String,
    pub password: String,
    /// Database file path
    pub database: String,
}

impl ConnectionParams {
    /// Parameters for a database file on this machine
    pub fn local(database: impl Into<String>) -> Self {
        Self {
            host: "localhost".to_string(),
            user: "root".to_string(),
            password: String::new(),
            database: database.into(),
        }
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableNames {
    pub tracks: String,
    pub awards: String,
    pub destination: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            tracks: TRACK_TABLE.to_string(),
            awards: AWARD_TABLE.to_string(),
            destination: DEST_TABLE.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct JobOptions {
    pub tables: TableNames,
    pub batch_size: usize,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl JobOptions {
    /// Checked before connecting: identifiers, destination/source collision,
    /// non-zero batch size.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.tables.tracks)?;
        validate_identifier(&self.tables.awards)?;
        validate_destination(
            &self.tables.destination,
            &[self.tables.tracks.as_str(), self.tables.awards.as_str()],
        )?;
        if self.batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_redacted() {
        let mut params = ConnectionParams::local("/tmp/db.sqlite3");
        params.password = "hunter2".to_string();
        let debug = format!("{:?}", params);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_default_options_valid() {
        let options = JobOptions::default();
        assert_eq!(options.batch_size, 1000);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let options = JobOptions {
            batch_size: 0,
            ..JobOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_destination_over_source_rejected() {
        let mut options = JobOptions::default();
        options.tables.destination = options.tables.awards.clone();
        assert!(options.validate().is_err());
    }
}
