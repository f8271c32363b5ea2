//! Spotify/Grammy merge job - shared modules for all binaries.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod job;
pub mod join;
pub mod load;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod safety;
pub mod schema;
pub mod verify;
