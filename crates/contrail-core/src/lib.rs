//! Emitter lifecycle, scheduling, and toggle protocol for Contrail trails.
//!
//! This crate owns everything between a player's stored preference and the
//! particle requests sent to the render sink: the registry of running
//! emitters, their periodic tasks, variant resolution, and the shared
//! rainbow color cycle.
//!
//! # Modules
//!
//! - [`activation`] -- Lazy start of emitters on position updates.
//! - [`color_cycle`] -- The process-wide rotating rainbow palette.
//! - [`command`] -- The `particles [rainbow|cloud]` command and its replies.
//! - [`config`] -- Configuration loading from `contrail-config.yaml` into
//!   strongly-typed structs.
//! - [`emitter`] -- Per-player periodic emitter and its cancellation
//!   protocol.
//! - [`host`] -- [`Host`] and [`RenderSink`] seams with in-memory
//!   implementations.
//! - [`preferences`] -- [`PreferenceStore`] seam and
//!   [`MemoryPreferenceStore`].
//! - [`registry`] -- [`EmitterRegistry`]: start, stop, toggle, disconnect,
//!   and shutdown.
//! - [`variant`] -- Variant resolution and burst generation.
//!
//! [`Host`]: host::Host
//! [`RenderSink`]: host::RenderSink
//! [`PreferenceStore`]: preferences::PreferenceStore
//! [`MemoryPreferenceStore`]: preferences::MemoryPreferenceStore
//! [`EmitterRegistry`]: registry::EmitterRegistry

pub mod activation;
pub mod color_cycle;
pub mod command;
pub mod config;
pub mod emitter;
pub mod host;
pub mod preferences;
pub mod registry;
pub mod variant;
