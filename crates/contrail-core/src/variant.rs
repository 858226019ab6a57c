//! Variant resolution and burst generation.
//!
//! [`resolve`] turns a player's requested variant (possibly unset, possibly
//! an unknown name coming from a hand-edited preference file) into a
//! [`BurstGenerator`]: the per-firing strategy with the effect type, burst
//! size, speed, and coloring rule captured from configuration. Resolution
//! has no hidden state and never fails; anything unrecognized becomes the
//! configured default variant.

use contrail_types::{DustOptions, EffectKind, EffectRequest, Position, Rgb, Variant};
use rand::Rng;

use crate::color_cycle::ColorCycle;
use crate::config::ParticleConfig;
use crate::host::RenderSink;

/// Maximum horizontal jitter on each axis, in blocks.
pub const JITTER: f64 = 0.5;

/// Fixed vertical lift applied to every particle, in blocks.
pub const LIFT: f64 = 0.1;

/// Colors emitted by the cloud variant on every iteration.
pub const CLOUD_PALETTE: [Rgb; 2] = [Rgb::WHITE, Rgb::GRAY];

/// How a burst picks its colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coloring {
    /// One color per firing from the shared [`ColorCycle`], which advances
    /// once after the burst.
    Cycle,
    /// Every listed color on every iteration; the shared cycle is untouched.
    Fixed(Vec<Rgb>),
    /// The effect type takes no color.
    Plain,
}

/// Per-firing generation strategy for one variant.
#[derive(Debug, Clone, PartialEq)]
pub struct BurstGenerator {
    variant: Variant,
    effect: EffectKind,
    amount: u32,
    speed: f64,
    coloring: Coloring,
}

/// Map a raw variant name to a [`Variant`], falling back to `default` for
/// unset or unknown names.
pub fn resolve_name(name: Option<&str>, default: Variant) -> Variant {
    name.and_then(|n| n.parse().ok()).unwrap_or(default)
}

/// Build the generator for `variant` under `config`.
pub fn resolve(variant: Option<Variant>, config: &ParticleConfig) -> BurstGenerator {
    let variant = variant.unwrap_or(config.default_variant);
    let coloring = match (config.effect.is_colorable(), variant) {
        (false, _) => Coloring::Plain,
        (true, Variant::Rainbow) => Coloring::Cycle,
        (true, Variant::Cloud) => Coloring::Fixed(CLOUD_PALETTE.to_vec()),
    };
    BurstGenerator {
        variant,
        effect: config.effect.clone(),
        amount: config.amount,
        speed: config.speed,
        coloring,
    }
}

impl BurstGenerator {
    /// The resolved variant.
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    /// The coloring rule.
    pub const fn coloring(&self) -> &Coloring {
        &self.coloring
    }

    /// Whether firings of this generator consume the shared color cycle.
    pub const fn uses_color_cycle(&self) -> bool {
        matches!(self.coloring, Coloring::Cycle)
    }

    /// Run one burst around `base`, forwarding each request to `sink`.
    ///
    /// Returns the number of requests forwarded. For [`Coloring::Cycle`]
    /// the cycle index is held for the whole burst and advanced once after
    /// the last request.
    pub fn fire(
        &self,
        base: &Position,
        cycle: &ColorCycle,
        rng: &mut impl Rng,
        sink: &dyn RenderSink,
    ) -> u32 {
        match &self.coloring {
            Coloring::Cycle => {
                cycle.paint_and_advance(|color| self.burst(base, &[color], rng, sink))
            }
            Coloring::Fixed(colors) => self.burst(base, colors, rng, sink),
            Coloring::Plain => self.burst(base, &[], rng, sink),
        }
    }

    fn burst(
        &self,
        base: &Position,
        colors: &[Rgb],
        rng: &mut impl Rng,
        sink: &dyn RenderSink,
    ) -> u32 {
        let mut sent: u32 = 0;
        for _ in 0..self.amount {
            let at = jitter(base, rng);
            if colors.is_empty() {
                sink.emit(&EffectRequest::single(
                    at,
                    self.effect.clone(),
                    self.speed,
                    None,
                ));
                sent = sent.saturating_add(1);
            } else {
                for &color in colors {
                    sink.emit(&EffectRequest::single(
                        at.clone(),
                        self.effect.clone(),
                        self.speed,
                        Some(DustOptions::new(color)),
                    ));
                    sent = sent.saturating_add(1);
                }
            }
        }
        sent
    }
}

/// Offset `base` by uniform jitter in `[-JITTER, JITTER)` on x and z and
/// by [`LIFT`] on y.
pub fn jitter(base: &Position, rng: &mut impl Rng) -> Position {
    let dx = rng.random_range(-JITTER..JITTER);
    let dz = rng.random_range(-JITTER..JITTER);
    base.offset(dx, LIFT, dz)
}
