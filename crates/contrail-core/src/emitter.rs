//! Per-player periodic emitter.
//!
//! An [`Emitter`] is the runtime record for one player's trail. It moves
//! through `Idle -> Scheduled -> Cancelled`; `Cancelled` is terminal and a
//! stopped emitter is never resumed (the registry builds a fresh one).
//!
//! # Scheduling
//!
//! Scheduling spawns one tokio task per emitter driven by
//! [`tokio::time::interval`] at the configured firing period. The first
//! tick completes immediately, so the first firing happens at tick 0.
//! Missed ticks are skipped rather than replayed, and because each emitter
//! is a single task its firings never overlap.
//!
//! # Cancellation
//!
//! Every firing runs while holding the emitter's state lock. Cancelling
//! takes the same lock, so it waits for an in-flight burst to finish and
//! then flips the state to `Cancelled`; any later firing sees the flag and
//! exits. Once [`ScheduledEmitter::cancel`] returns no further firing is
//! observed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use contrail_types::{PlayerId, Variant};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::color_cycle::ColorCycle;
use crate::config::{ContrailConfig, ParticleConfig};
use crate::host::{Host, RenderSink};
use crate::variant::BurstGenerator;

/// Shortest firing period the scheduler accepts.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Shared, explicitly owned state every emitter fires against.
///
/// Built once at startup and handed to the registry behind an [`Arc`].
/// Holds the injected host and sink, the process-wide color cycle, and the
/// validated particle settings.
pub struct EmitterContext {
    host: Arc<dyn Host>,
    sink: Arc<dyn RenderSink>,
    color_cycle: Arc<ColorCycle>,
    particles: ParticleConfig,
    period: Duration,
}

impl EmitterContext {
    /// Assemble a context from explicit parts.
    pub fn new(
        host: Arc<dyn Host>,
        sink: Arc<dyn RenderSink>,
        color_cycle: Arc<ColorCycle>,
        particles: ParticleConfig,
        period: Duration,
    ) -> Self {
        Self {
            host,
            sink,
            color_cycle,
            particles,
            period: period.max(MIN_PERIOD),
        }
    }

    /// Assemble a context from loaded configuration.
    pub fn from_config(
        config: &ContrailConfig,
        host: Arc<dyn Host>,
        sink: Arc<dyn RenderSink>,
        color_cycle: Arc<ColorCycle>,
    ) -> Self {
        Self::new(
            host,
            sink,
            color_cycle,
            config.particles.clone(),
            config.firing_period(),
        )
    }

    /// The injected host.
    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    /// The shared color cycle.
    pub fn color_cycle(&self) -> &ColorCycle {
        &self.color_cycle
    }

    /// Particle settings.
    pub const fn particles(&self) -> &ParticleConfig {
        &self.particles
    }

    /// Real-time period between firings.
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl std::fmt::Debug for EmitterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmitterContext")
            .field("color_cycle", &self.color_cycle)
            .field("particles", &self.particles)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of an [`Emitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    /// Built but not yet scheduled.
    Idle,
    /// Periodic task running.
    Scheduled,
    /// Stopped for good.
    Cancelled,
}

/// What a single firing did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiringOutcome {
    /// The emitter was cancelled; nothing ran.
    Cancelled,
    /// The gate predicate was false; nothing emitted.
    Gated,
    /// The host had no position for the player; nothing emitted.
    NoPosition,
    /// A burst ran and forwarded this many requests.
    Emitted(u32),
}

/// The periodic trail task state for one player.
#[derive(Debug)]
pub struct Emitter {
    player: PlayerId,
    generator: BurstGenerator,
    state: Mutex<EmitterState>,
    firings: AtomicU64,
    emitted: AtomicU64,
    created_at: DateTime<Utc>,
}

impl Emitter {
    /// Build an idle emitter for `player`.
    pub fn new(player: PlayerId, generator: BurstGenerator) -> Self {
        Self {
            player,
            generator,
            state: Mutex::new(EmitterState::Idle),
            firings: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
            created_at: Utc::now(),
        }
    }

    /// The player this emitter belongs to.
    pub const fn player(&self) -> PlayerId {
        self.player
    }

    /// The resolved variant.
    pub const fn variant(&self) -> Variant {
        self.generator.variant()
    }

    /// Firings that ran (gated ones included, cancelled ones excluded).
    pub fn firings(&self) -> u64 {
        self.firings.load(Ordering::Acquire)
    }

    /// Requests forwarded to the sink over the emitter's lifetime.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Acquire)
    }

    /// When the emitter was built.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> EmitterState {
        *self.state.lock().await
    }

    /// Run one firing now, unless cancelled.
    pub async fn fire_once(&self, ctx: &EmitterContext, rng: &mut impl Rng) -> FiringOutcome {
        let state = self.state.lock().await;
        if *state == EmitterState::Cancelled {
            return FiringOutcome::Cancelled;
        }
        let outcome = self.fire_locked(ctx, rng);
        drop(state);
        outcome
    }

    /// Move to `Cancelled`, waiting out any in-flight firing.
    ///
    /// Returns `false` if the emitter was already cancelled.
    pub async fn cancel(&self) -> bool {
        let mut state = self.state.lock().await;
        let was_live = *state != EmitterState::Cancelled;
        *state = EmitterState::Cancelled;
        was_live
    }

    fn fire_locked(&self, ctx: &EmitterContext, rng: &mut impl Rng) -> FiringOutcome {
        self.firings.fetch_add(1, Ordering::AcqRel);

        let gate = ctx.particles.display.when_flying && ctx.host.is_flying(self.player);
        if !gate {
            trace!(player = %self.player, "Firing gated");
            return FiringOutcome::Gated;
        }

        let Some(base) = ctx.host.current_position(self.player) else {
            trace!(player = %self.player, "Firing skipped, no position");
            return FiringOutcome::NoPosition;
        };

        let sent = self
            .generator
            .fire(&base, &ctx.color_cycle, rng, ctx.sink.as_ref());
        self.emitted.fetch_add(u64::from(sent), Ordering::AcqRel);
        trace!(
            player = %self.player,
            variant = %self.variant(),
            sent,
            world = %base.world,
            "Firing emitted"
        );
        FiringOutcome::Emitted(sent)
    }
}

/// A scheduled emitter and the handle of its periodic task.
#[derive(Debug)]
pub struct ScheduledEmitter {
    emitter: Arc<Emitter>,
    task: JoinHandle<()>,
}

impl ScheduledEmitter {
    /// Build an emitter for `player` and spawn its periodic task at once.
    pub fn spawn(player: PlayerId, generator: BurstGenerator, ctx: Arc<EmitterContext>) -> Self {
        let mut emitter = Emitter::new(player, generator);
        *emitter.state.get_mut() = EmitterState::Scheduled;
        let emitter = Arc::new(emitter);
        let task = tokio::spawn(run(Arc::clone(&emitter), ctx));
        Self { emitter, task }
    }

    /// The emitter record.
    pub const fn emitter(&self) -> &Arc<Emitter> {
        &self.emitter
    }

    /// Whether the periodic task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel synchronously: after this returns no firing runs again.
    pub async fn cancel(self) {
        self.emitter.cancel().await;
        self.task.abort();
    }
}

/// Body of an emitter's periodic task.
async fn run(emitter: Arc<Emitter>, ctx: Arc<EmitterContext>) {
    let mut ticker = tokio::time::interval(ctx.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut rng = SmallRng::from_os_rng();

    loop {
        ticker.tick().await;
        if emitter.fire_once(&ctx, &mut rng).await == FiringOutcome::Cancelled {
            break;
        }
    }

    debug!(
        player = %emitter.player,
        firings = emitter.firings(),
        emitted = emitter.emitted(),
        "Emitter task exited"
    );
}
