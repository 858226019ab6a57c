//! Emitter registry: the identity -> emitter table and its protocol.
//!
//! [`EmitterRegistry`] owns every running emitter by player key and is the
//! only component allowed to create or cancel one. All operations take the
//! registry lock for their full duration, which gives a single writer per
//! player: a toggle cannot interleave with a start or stop for the same
//! player, and the at-most-one-emitter-per-player invariant holds at every
//! instant.
//!
//! Emitters never point back at the registry; they hold only their player,
//! generator, and the shared [`EmitterContext`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use contrail_types::{PlayerId, Preference, Variant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::emitter::{EmitterContext, ScheduledEmitter};
use crate::preferences::PreferenceStore;
use crate::variant::resolve;

/// Result of [`EmitterRegistry::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new emitter was scheduled.
    Started,
    /// The player already had an emitter; nothing changed.
    AlreadyActive,
    /// The registry has shut down and accepts no new emitters.
    Closed,
}

/// Result of [`EmitterRegistry::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The trail is now on with this variant.
    Enabled(Variant),
    /// The trail is now off.
    Disabled,
    /// The trail is already on with the requested variant; nothing changed.
    AlreadyEnabled,
    /// The registry has shut down; nothing changed.
    Closed,
}

/// Snapshot of one running emitter, for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterInfo {
    /// Owning player.
    pub player: PlayerId,
    /// Resolved variant.
    pub variant: Variant,
    /// Firings so far.
    pub firings: u64,
    /// Requests forwarded so far.
    pub emitted: u64,
    /// When the emitter was created.
    pub started_at: DateTime<Utc>,
}

/// What [`EmitterRegistry::shutdown`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Emitters cancelled.
    pub cancelled: usize,
    /// Whether the final preference flush succeeded.
    pub flushed: bool,
}

#[derive(Debug, Default)]
struct Table {
    emitters: BTreeMap<PlayerId, ScheduledEmitter>,
    closed: bool,
}

/// Concurrency-safe table of running emitters.
pub struct EmitterRegistry {
    context: Arc<EmitterContext>,
    store: Arc<dyn PreferenceStore>,
    table: Mutex<Table>,
}

impl EmitterRegistry {
    /// Create an empty registry.
    pub fn new(context: Arc<EmitterContext>, store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            context,
            store,
            table: Mutex::new(Table::default()),
        }
    }

    /// The shared emitter context.
    pub const fn context(&self) -> &Arc<EmitterContext> {
        &self.context
    }

    /// The preference store.
    pub fn store(&self) -> &dyn PreferenceStore {
        self.store.as_ref()
    }

    /// Schedule an emitter for `player` unless one is already running.
    ///
    /// The first firing happens immediately. An unset variant resolves to
    /// the configured default.
    pub async fn start(&self, player: PlayerId, variant: Option<Variant>) -> StartOutcome {
        let mut table = self.table.lock().await;
        self.start_locked(&mut table, player, variant)
    }

    /// Cancel and remove `player`'s emitter. Returns whether one existed.
    ///
    /// Idempotent. When this returns, the emitter will not fire again.
    pub async fn stop(&self, player: PlayerId) -> bool {
        let mut table = self.table.lock().await;
        Self::stop_locked(&mut table, player).await
    }

    /// Tear down after a player disconnects. Safe if never started.
    ///
    /// The stored preference is left untouched so the trail resumes on the
    /// player's next qualifying move.
    pub async fn on_disconnect(&self, player: PlayerId) {
        if self.stop(player).await {
            debug!(player = %player, "Emitter removed on disconnect");
        }
    }

    /// Flip the player's trail.
    ///
    /// If the trail is on and `requested` names the variant already stored,
    /// nothing changes and [`ToggleOutcome::AlreadyEnabled`] is returned.
    /// Otherwise an enabled trail is stopped and persisted as disabled, and
    /// a disabled trail is started and persisted as enabled with
    /// `requested`. Requesting a different variant while on turns the
    /// trail off; it does not switch variants. An argument-less toggle
    /// never reports `AlreadyEnabled`; it always flips.
    ///
    /// After [`shutdown`](Self::shutdown) nothing is started or persisted
    /// and [`ToggleOutcome::Closed`] is returned.
    pub async fn toggle(&self, player: PlayerId, requested: Option<Variant>) -> ToggleOutcome {
        let mut table = self.table.lock().await;
        if table.closed {
            debug!(player = %player, "Toggle refused, registry closed");
            return ToggleOutcome::Closed;
        }
        let current = self.store.get(player);

        if current.enabled && requested.is_some() && requested == current.variant {
            debug!(player = %player, variant = ?requested, "Toggle refused, already enabled");
            return ToggleOutcome::AlreadyEnabled;
        }

        let outcome = if current.enabled {
            Self::stop_locked(&mut table, player).await;
            self.store.set(
                player,
                Preference {
                    enabled: false,
                    variant: current.variant,
                },
            );
            ToggleOutcome::Disabled
        } else {
            // An emitter started directly may run a different variant.
            Self::stop_locked(&mut table, player).await;
            if self.start_locked(&mut table, player, requested) != StartOutcome::Started {
                return ToggleOutcome::Closed;
            }
            let running = table
                .emitters
                .get(&player)
                .map_or(self.context.particles().default_variant, |s| {
                    s.emitter().variant()
                });
            self.store.set(player, Preference::enabled(requested));
            ToggleOutcome::Enabled(running)
        };
        drop(table);

        info!(player = %player, outcome = ?outcome, "Trail toggled");
        self.persist();
        outcome
    }

    /// Start `player`'s emitter if their stored preference is enabled.
    ///
    /// Returns `None` when the preference is disabled. The preference read
    /// and the start happen under one lock, so a concurrent toggle-off
    /// cannot be undone by a stale read.
    pub async fn start_from_preference(&self, player: PlayerId) -> Option<StartOutcome> {
        let mut table = self.table.lock().await;
        if table.emitters.contains_key(&player) {
            return Some(StartOutcome::AlreadyActive);
        }
        let preference = self.store.get(player);
        if !preference.enabled {
            return None;
        }
        Some(self.start_locked(&mut table, player, preference.variant))
    }

    /// Whether `player` has a running emitter.
    pub async fn is_active(&self, player: PlayerId) -> bool {
        self.table.lock().await.emitters.contains_key(&player)
    }

    /// Number of running emitters.
    pub async fn len(&self) -> usize {
        self.table.lock().await.emitters.len()
    }

    /// Whether no emitter is running.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every running emitter, ordered by player.
    pub async fn active(&self) -> Vec<EmitterInfo> {
        let table = self.table.lock().await;
        table
            .emitters
            .values()
            .map(|scheduled| {
                let emitter = scheduled.emitter();
                EmitterInfo {
                    player: emitter.player(),
                    variant: emitter.variant(),
                    firings: emitter.firings(),
                    emitted: emitter.emitted(),
                    started_at: emitter.created_at(),
                }
            })
            .collect()
    }

    /// Cancel every emitter, refuse new ones, and flush preferences.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut table = self.table.lock().await;
        table.closed = true;
        let emitters = std::mem::take(&mut table.emitters);
        let cancelled = emitters.len();
        for (_, scheduled) in emitters {
            scheduled.cancel().await;
        }
        drop(table);

        let flush = self.store.flush();
        if let Err(e) = &flush {
            error!(error = %e, "Failed to flush preferences during shutdown");
        }
        let flushed = flush.is_ok();

        info!(cancelled, flushed, "Emitter registry shut down");
        ShutdownReport { cancelled, flushed }
    }

    fn start_locked(
        &self,
        table: &mut Table,
        player: PlayerId,
        variant: Option<Variant>,
    ) -> StartOutcome {
        if table.closed {
            debug!(player = %player, "Start refused, registry closed");
            return StartOutcome::Closed;
        }
        if table.emitters.contains_key(&player) {
            debug!(player = %player, "Start ignored, emitter already active");
            return StartOutcome::AlreadyActive;
        }

        let generator = resolve(variant, self.context.particles());
        let variant = generator.variant();
        let scheduled = ScheduledEmitter::spawn(player, generator, Arc::clone(&self.context));
        table.emitters.insert(player, scheduled);

        info!(
            player = %player,
            variant = %variant,
            period_ms = u64::try_from(self.context.period().as_millis()).unwrap_or(u64::MAX),
            active = table.emitters.len(),
            "Emitter started"
        );
        StartOutcome::Started
    }

    async fn stop_locked(table: &mut Table, player: PlayerId) -> bool {
        let Some(scheduled) = table.emitters.remove(&player) else {
            return false;
        };
        let firings = scheduled.emitter().firings();
        scheduled.cancel().await;
        info!(
            player = %player,
            firings,
            active = table.emitters.len(),
            "Emitter stopped"
        );
        true
    }

    /// Flush the store, logging instead of propagating a failure.
    fn persist(&self) {
        if let Err(e) = self.store.flush() {
            warn!(error = %e, "Failed to persist preferences; change kept in memory");
        }
    }
}

impl std::fmt::Debug for EmitterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmitterRegistry")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use contrail_types::Position;

    use super::*;
    use crate::color_cycle::ColorCycle;
    use crate::config::ParticleConfig;
    use crate::host::{Host, MemoryHost, RecordingSink, RenderSink};
    use crate::preferences::MemoryPreferenceStore;

    const PERIOD: Duration = Duration::from_millis(50);

    struct Fixture {
        host: Arc<MemoryHost>,
        sink: Arc<RecordingSink>,
        store: Arc<MemoryPreferenceStore>,
        registry: EmitterRegistry,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(MemoryHost::new());
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(MemoryPreferenceStore::new());
        let ctx = Arc::new(EmitterContext::new(
            Arc::clone(&host) as Arc<dyn Host>,
            Arc::clone(&sink) as Arc<dyn RenderSink>,
            Arc::new(ColorCycle::rainbow()),
            ParticleConfig::default(),
            PERIOD,
        ));
        let registry =
            EmitterRegistry::new(ctx, Arc::clone(&store) as Arc<dyn PreferenceStore>);
        Fixture {
            host,
            sink,
            store,
            registry,
        }
    }

    fn flying_player(host: &MemoryHost) -> PlayerId {
        let player = PlayerId::new();
        host.set_position(player, Position::new("overworld", 5.0, 90.0, 5.0));
        host.set_flying(player, true);
        player
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn start_twice_keeps_one_emitter() {
        let f = fixture();
        let player = PlayerId::new();

        assert_eq!(f.registry.start(player, None).await, StartOutcome::Started);
        assert_eq!(
            f.registry.start(player, Some(Variant::Cloud)).await,
            StartOutcome::AlreadyActive
        );
        assert_eq!(f.registry.len().await, 1);

        let active = f.registry.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active.first().map(|i| i.variant), Some(Variant::Rainbow));
        f.registry.stop(player).await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let f = fixture();
        let player = PlayerId::new();
        f.registry.start(player, None).await;

        assert!(f.registry.stop(player).await);
        assert!(!f.registry.stop(player).await);
        assert!(!f.registry.is_active(player).await);
        assert!(f.registry.is_empty().await);
    }

    #[tokio::test]
    async fn disconnect_without_start_is_safe() {
        let f = fixture();
        f.registry.on_disconnect(PlayerId::new()).await;
        assert!(f.registry.is_empty().await);
    }

    #[tokio::test]
    async fn disconnect_keeps_preference() {
        let f = fixture();
        let player = PlayerId::new();
        f.registry.toggle(player, Some(Variant::Cloud)).await;
        f.registry.on_disconnect(player).await;

        assert!(!f.registry.is_active(player).await);
        assert_eq!(
            f.store.get(player),
            Preference::enabled(Some(Variant::Cloud))
        );
    }

    #[tokio::test]
    async fn toggle_without_argument_round_trips() {
        let f = fixture();
        let player = PlayerId::new();

        assert_eq!(
            f.registry.toggle(player, None).await,
            ToggleOutcome::Enabled(Variant::Rainbow)
        );
        assert!(f.registry.is_active(player).await);
        assert_eq!(f.store.get(player), Preference::enabled(None));

        assert_eq!(f.registry.toggle(player, None).await, ToggleOutcome::Disabled);
        assert!(!f.registry.is_active(player).await);
        assert!(!f.store.get(player).enabled);
        assert_eq!(f.store.flush_count(), 2);
    }

    #[tokio::test]
    async fn repeating_named_variant_reports_already_enabled() {
        let f = fixture();
        let player = PlayerId::new();

        assert_eq!(
            f.registry.toggle(player, Some(Variant::Rainbow)).await,
            ToggleOutcome::Enabled(Variant::Rainbow)
        );
        let flushes = f.store.flush_count();

        assert_eq!(
            f.registry.toggle(player, Some(Variant::Rainbow)).await,
            ToggleOutcome::AlreadyEnabled
        );
        assert!(f.registry.is_active(player).await);
        assert_eq!(
            f.store.get(player),
            Preference::enabled(Some(Variant::Rainbow))
        );
        assert_eq!(f.store.flush_count(), flushes);
    }

    #[tokio::test]
    async fn different_variant_while_enabled_disables() {
        let f = fixture();
        let player = PlayerId::new();
        f.store
            .set(player, Preference::enabled(Some(Variant::Rainbow)));
        f.registry.start(player, Some(Variant::Rainbow)).await;

        assert_eq!(
            f.registry.toggle(player, Some(Variant::Cloud)).await,
            ToggleOutcome::Disabled
        );
        assert!(!f.registry.is_active(player).await);
        assert_eq!(
            f.store.get(player),
            Preference {
                enabled: false,
                variant: Some(Variant::Rainbow),
            }
        );
    }

    #[tokio::test]
    async fn named_toggle_after_disable_enables_again() {
        let f = fixture();
        let player = PlayerId::new();
        f.registry.toggle(player, Some(Variant::Rainbow)).await;
        f.registry.toggle(player, Some(Variant::Cloud)).await;

        assert_eq!(
            f.registry.toggle(player, Some(Variant::Rainbow)).await,
            ToggleOutcome::Enabled(Variant::Rainbow)
        );
        assert!(f.registry.is_active(player).await);
    }

    #[tokio::test]
    async fn toggle_survives_flush_failure() {
        let f = fixture();
        let player = PlayerId::new();
        f.store.set_fail_flush(true);

        assert_eq!(
            f.registry.toggle(player, Some(Variant::Cloud)).await,
            ToggleOutcome::Enabled(Variant::Cloud)
        );
        assert!(f.registry.is_active(player).await);
        assert!(f.store.get(player).enabled);
        f.registry.stop(player).await;
    }

    #[tokio::test]
    async fn start_from_preference_requires_enabled() {
        let f = fixture();
        let player = PlayerId::new();

        assert_eq!(f.registry.start_from_preference(player).await, None);
        assert!(!f.registry.is_active(player).await);

        f.store.set(player, Preference::enabled(Some(Variant::Cloud)));
        assert_eq!(
            f.registry.start_from_preference(player).await,
            Some(StartOutcome::Started)
        );
        assert_eq!(
            f.registry.start_from_preference(player).await,
            Some(StartOutcome::AlreadyActive)
        );
        let active = f.registry.active().await;
        assert_eq!(active.first().map(|i| i.variant), Some(Variant::Cloud));
        f.registry.stop(player).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rainbow_firing_via_registry() {
        let f = fixture();
        let player = flying_player(&f.host);

        f.registry.start(player, Some(Variant::Rainbow)).await;
        settle().await;

        let requests = f.sink.requests();
        assert_eq!(requests.len(), 10);
        let first = requests.first().and_then(|r| r.color());
        assert!(requests.iter().all(|r| r.color() == first));
        assert_eq!(f.registry.context().color_cycle().index(), 1);
        f.registry.stop(player).await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_firing_after_stop() {
        let f = fixture();
        let player = flying_player(&f.host);
        f.registry.start(player, None).await;
        settle().await;

        f.registry.stop(player).await;
        let before = f.sink.total();
        for _ in 0..4 {
            tokio::time::advance(PERIOD).await;
            settle().await;
        }
        assert_eq!(f.sink.total(), before);
    }

    #[tokio::test]
    async fn concurrent_toggles_leave_at_most_one_emitter() {
        let f = Arc::new(fixture());
        let player = PlayerId::new();

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let f = Arc::clone(&f);
                tokio::spawn(async move {
                    let variant = if i % 2 == 0 { None } else { Some(Variant::Cloud) };
                    f.registry.toggle(player, variant).await
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        let len = f.registry.len().await;
        assert!(len <= 1);
        assert_eq!(len == 1, f.store.get(player).enabled);
        f.registry.stop(player).await;
    }

    #[tokio::test]
    async fn shutdown_cancels_everything_and_flushes() {
        let f = fixture();
        let players: Vec<_> = (0..5).map(|_| PlayerId::new()).collect();
        for &p in &players {
            f.registry.start(p, None).await;
        }

        let report = f.registry.shutdown().await;

        assert_eq!(
            report,
            ShutdownReport {
                cancelled: 5,
                flushed: true
            }
        );
        assert!(f.registry.is_empty().await);
        assert_eq!(
            f.registry.start(PlayerId::new(), None).await,
            StartOutcome::Closed
        );
    }

    #[tokio::test]
    async fn toggle_after_shutdown_changes_nothing() {
        let f = fixture();
        let player = PlayerId::new();
        f.registry.shutdown().await;
        let flushes = f.store.flush_count();

        assert_eq!(
            f.registry.toggle(player, Some(Variant::Cloud)).await,
            ToggleOutcome::Closed
        );
        assert!(!f.registry.is_active(player).await);
        assert_eq!(f.store.get(player), Preference::default());
        assert_eq!(f.store.flush_count(), flushes);
    }

    #[tokio::test]
    async fn toggle_on_replaces_emitter_running_other_variant() {
        let f = fixture();
        let player = PlayerId::new();
        f.registry.start(player, Some(Variant::Rainbow)).await;

        assert_eq!(
            f.registry.toggle(player, Some(Variant::Cloud)).await,
            ToggleOutcome::Enabled(Variant::Cloud)
        );
        let active = f.registry.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active.first().map(|i| i.variant), Some(Variant::Cloud));
        assert_eq!(f.store.get(player), Preference::enabled(Some(Variant::Cloud)));
        f.registry.stop(player).await;
    }

    #[tokio::test]
    async fn shutdown_reports_flush_failure() {
        let f = fixture();
        f.store.set_fail_flush(true);
        let report = f.registry.shutdown().await;
        assert!(!report.flushed);
    }
}
