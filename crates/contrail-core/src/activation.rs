//! Lazy activation on position updates.
//!
//! Trails are not started at join. The first position update that finds
//! the player permitted, the feature enabled, and a stored preference of
//! `enabled` starts the emitter. Every later update is a cheap no-op
//! because the registry already holds one.

use std::sync::Arc;

use contrail_types::PlayerId;
use tracing::trace;

use crate::host::SHOW_PERMISSION;
use crate::registry::{EmitterRegistry, StartOutcome};

/// What a position update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The player lacks the show permission.
    NotPermitted,
    /// Trails are disabled in configuration.
    FeatureDisabled,
    /// The stored preference is disabled.
    PreferenceDisabled,
    /// An emitter was already running.
    AlreadyActive,
    /// A new emitter was started.
    Started,
    /// The registry is shut down.
    Closed,
}

/// Reacts to position updates by starting emitters on demand.
#[derive(Debug, Clone)]
pub struct ActivationTrigger {
    registry: Arc<EmitterRegistry>,
}

impl ActivationTrigger {
    /// Create a trigger feeding `registry`.
    pub const fn new(registry: Arc<EmitterRegistry>) -> Self {
        Self { registry }
    }

    /// Handle one position update for `player`.
    pub async fn on_position_update(&self, player: PlayerId) -> Activation {
        let ctx = self.registry.context();
        if !ctx.host().has_permission(player, SHOW_PERMISSION) {
            return Activation::NotPermitted;
        }
        if !ctx.particles().enabled {
            return Activation::FeatureDisabled;
        }

        let activation = match self.registry.start_from_preference(player).await {
            None => Activation::PreferenceDisabled,
            Some(StartOutcome::Started) => Activation::Started,
            Some(StartOutcome::AlreadyActive) => Activation::AlreadyActive,
            Some(StartOutcome::Closed) => Activation::Closed,
        };
        trace!(player = %player, activation = ?activation, "Position update handled");
        activation
    }
}
