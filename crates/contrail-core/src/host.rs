//! Host and render sink seams.
//!
//! The core never talks to a game server directly. The [`Host`] trait
//! answers the three questions an emitter or the activation trigger asks
//! about a player, and the [`RenderSink`] accepts particle spawns without
//! acknowledging them. Both are injected as `Arc<dyn _>` so a real server
//! adapter, the console simulation in the engine binary, and test doubles
//! are interchangeable.
//!
//! [`MemoryHost`] and [`RecordingSink`] are in-process implementations
//! used by the engine's console simulation and by tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use contrail_types::{EffectRequest, PlayerId, Position};

/// Capability a player needs to see or toggle trails.
pub const SHOW_PERMISSION: &str = "particles.show";

/// Live player state supplied by the host environment.
pub trait Host: Send + Sync {
    /// The player's current position, or `None` if the host cannot supply
    /// one (offline, between worlds).
    fn current_position(&self, player: PlayerId) -> Option<Position>;

    /// Whether the player is in the gated movement state (flying).
    fn is_flying(&self, player: PlayerId) -> bool;

    /// Whether the player holds `capability`.
    fn has_permission(&self, player: PlayerId, capability: &str) -> bool;
}

/// Destination for particle spawns.
///
/// Fire-and-forget: the core never waits on or inspects the outcome of a
/// request, and a failed spawn is not retried.
pub trait RenderSink: Send + Sync {
    /// Spawn one particle request.
    fn emit(&self, request: &EffectRequest);
}

/// State the [`MemoryHost`] keeps for one player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerView {
    /// Last reported position.
    pub position: Option<Position>,
    /// Whether the player is flying.
    pub flying: bool,
    /// Granted capabilities.
    pub permissions: BTreeSet<String>,
}

/// An in-memory [`Host`] whose state is set explicitly.
#[derive(Debug, Default)]
pub struct MemoryHost {
    players: RwLock<BTreeMap<PlayerId, PlayerView>>,
}

impl MemoryHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player with no position, not flying, no permissions.
    pub fn join(&self, player: PlayerId) {
        self.write().entry(player).or_default();
    }

    /// Forget a player entirely.
    pub fn leave(&self, player: PlayerId) {
        self.write().remove(&player);
    }

    /// Whether the player is known to the host.
    pub fn is_online(&self, player: PlayerId) -> bool {
        self.read().contains_key(&player)
    }

    /// Record a new position for the player.
    pub fn set_position(&self, player: PlayerId, position: Position) {
        self.write().entry(player).or_default().position = Some(position);
    }

    /// Set the player's flying state.
    pub fn set_flying(&self, player: PlayerId, flying: bool) {
        self.write().entry(player).or_default().flying = flying;
    }

    /// Grant a capability.
    pub fn grant(&self, player: PlayerId, capability: &str) {
        self.write()
            .entry(player)
            .or_default()
            .permissions
            .insert(capability.to_owned());
    }

    /// Revoke a capability.
    pub fn revoke(&self, player: PlayerId, capability: &str) {
        if let Some(view) = self.write().get_mut(&player) {
            view.permissions.remove(capability);
        }
    }

    /// Snapshot of one player's state.
    pub fn view(&self, player: PlayerId) -> Option<PlayerView> {
        self.read().get(&player).cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<PlayerId, PlayerView>> {
        self.players.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<PlayerId, PlayerView>> {
        self.players.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Host for MemoryHost {
    fn current_position(&self, player: PlayerId) -> Option<Position> {
        self.read().get(&player).and_then(|v| v.position.clone())
    }

    fn is_flying(&self, player: PlayerId) -> bool {
        self.read().get(&player).is_some_and(|v| v.flying)
    }

    fn has_permission(&self, player: PlayerId, capability: &str) -> bool {
        self.read()
            .get(&player)
            .is_some_and(|v| v.permissions.contains(capability))
    }
}

/// A [`RenderSink`] that keeps every request it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    requests: Mutex<Vec<EffectRequest>>,
    total: AtomicU64,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests received since creation.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Copy of the retained requests.
    pub fn requests(&self) -> Vec<EffectRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return the retained requests.
    pub fn drain(&self) -> Vec<EffectRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl RenderSink for RecordingSink {
    fn emit(&self, request: &EffectRequest) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.total.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use contrail_types::EffectKind;

    use super::*;

    #[test]
    fn unknown_player_has_nothing() {
        let host = MemoryHost::new();
        let player = PlayerId::new();
        assert!(host.current_position(player).is_none());
        assert!(!host.is_flying(player));
        assert!(!host.has_permission(player, SHOW_PERMISSION));
    }

    #[test]
    fn grant_and_revoke() {
        let host = MemoryHost::new();
        let player = PlayerId::new();
        host.join(player);
        host.grant(player, SHOW_PERMISSION);
        assert!(host.has_permission(player, SHOW_PERMISSION));
        host.revoke(player, SHOW_PERMISSION);
        assert!(!host.has_permission(player, SHOW_PERMISSION));
    }

    #[test]
    fn leave_forgets_state() {
        let host = MemoryHost::new();
        let player = PlayerId::new();
        host.set_position(player, Position::new("w", 1.0, 2.0, 3.0));
        host.set_flying(player, true);
        assert!(host.is_online(player));
        host.leave(player);
        assert!(!host.is_online(player));
        assert!(host.current_position(player).is_none());
    }

    #[test]
    fn recording_sink_counts_and_drains() {
        let sink = RecordingSink::new();
        let req = EffectRequest::single(
            Position::new("w", 0.0, 0.0, 0.0),
            EffectKind::new("CLOUD"),
            0.0,
            None,
        );
        sink.emit(&req);
        sink.emit(&req);
        assert_eq!(sink.total(), 2);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.requests().is_empty());
        assert_eq!(sink.total(), 2);
    }
}
