//! Obsidian vault export of stored meetings.

pub mod vault;

pub use vault::{VaultSummary, build_vault};
