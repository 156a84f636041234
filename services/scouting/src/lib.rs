//! Youth-development analytics over player, club, minutes and games sheets.

pub mod aggregate;
pub mod config;
pub mod edits;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod join;
pub mod normalize;
pub mod outputs;
pub mod profile;
pub mod ranking;
pub mod schema;
pub mod scoring;
