//! Shared type definitions for the Contrail particle trail service.
//!
//! This crate is the single source of truth for the values that cross
//! crate boundaries: player identities, world positions, colors, effect
//! requests handed to the render sink, and the persisted per-player
//! preference record.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for player identities
//! - [`enums`] -- Trail variants
//! - [`structs`] -- Positions, colors, effect requests, and preferences

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ParseVariantError, Variant};
pub use ids::PlayerId;
pub use structs::{DustOptions, EffectKind, EffectRequest, Position, Preference, Rgb};
