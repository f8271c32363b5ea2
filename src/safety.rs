//! Safety checks on table names.
//!
//! The load step deletes every row of the destination table, and table names
//! are interpolated into SQL. Both checks run before any connection is opened.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validates that a table name is a plain SQL identifier.
pub fn validate_identifier(name: &str) -> Result<()> {
    if !IDENTIFIER.is_match(name) {
        bail!(
            "Safety check failed: table name '{}' must match [A-Za-z_][A-Za-z0-9_]*",
            name
        );
    }
    Ok(())
}

/// Validates that the destination table is safe to truncate.
///
/// # Arguments
/// * `destination` - The table that will be emptied and refilled
/// * `sources` - Tables that are read and must never be truncated
///
/// # Returns
/// * `Ok(())` if the destination is none of the sources
/// * `Err` with a descriptive message if the check fails
pub fn validate_destination(destination: &str, sources: &[&str]) -> Result<()> {
    validate_identifier(destination)?;

    // SQLite table names are case-insensitive
    for source in sources {
        validate_identifier(source)?;
        if destination.eq_ignore_ascii_case(source) {
            bail!(
                "Safety check failed: destination '{}' cannot be the same as source '{}'",
                destination,
                source
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_defaults() {
        assert!(validate_destination(
            "Spotify_Grrammy_Merge",
            &["spotify_dataset", "the_grammy_awards"]
        )
        .is_ok());
    }

    #[test]
    fn test_injection_rejected() {
        let result = validate_identifier("tracks; DROP TABLE spotify_dataset");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("must match"));
    }

    #[test]
    fn test_leading_digit_rejected() {
        assert!(validate_identifier("1tracks").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_destination_equals_source() {
        let result = validate_destination("SPOTIFY_dataset", &["spotify_dataset"]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as source"));
    }
}
