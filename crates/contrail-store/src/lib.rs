//! File-backed preference storage for Contrail.
//!
//! Player trail preferences live in a single `players.yml` keyed by player
//! UUID. [`YamlPreferenceStore`] loads the file once, serves reads from
//! memory, and rewrites the file on flush.
//!
//! # Modules
//!
//! - [`yaml_store`] -- [`YamlPreferenceStore`], the `players.yml` adapter
//! - [`error`] -- Shared error types

pub mod error;
pub mod yaml_store;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use yaml_store::YamlPreferenceStore;
