//! Core value structs for the Contrail service.
//!
//! Covers world positions, dust colors, the effect request handed to the
//! render sink, and the persisted per-player [`Preference`].

use serde::{Deserialize, Serialize};

use crate::enums::Variant;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A point in a named world, as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Name of the world the point belongs to.
    pub world: String,
    /// East-west coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// North-south coordinate.
    pub z: f64,
}

impl Position {
    /// Create a position in `world`.
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Return a copy of this position moved by the given deltas.
    #[must_use]
    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// An opaque 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);
    /// Mid gray.
    pub const GRAY: Self = Self::new(128, 128, 128);

    /// Build a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl core::fmt::Display for Rgb {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Color and size parameters for a colorable (dust) particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DustOptions {
    /// Particle color.
    pub color: Rgb,
    /// Particle scale; 1.0 is the host's normal size.
    pub size: f32,
}

impl DustOptions {
    /// Dust of the given color at normal size.
    pub const fn new(color: Rgb) -> Self {
        Self { color, size: 1.0 }
    }
}

// ---------------------------------------------------------------------------
// Effect requests
// ---------------------------------------------------------------------------

/// The host-side particle type name, e.g. `REDSTONE` or `CLOUD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectKind(pub String);

impl EffectKind {
    /// Host particle types that accept [`DustOptions`].
    const COLORABLE: [&'static str; 2] = ["REDSTONE", "DUST"];

    /// Wrap a particle type name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Whether this particle type takes a color.
    pub fn is_colorable(&self) -> bool {
        Self::COLORABLE
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&self.0))
    }

    /// The raw type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EffectKind {
    fn default() -> Self {
        Self::new("REDSTONE")
    }
}

impl core::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One particle spawn forwarded to the render sink.
///
/// Mirrors the host call `spawn(world, x, y, z, effect, count, spread,
/// speed, dust)`. Requests are fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRequest {
    /// Where to spawn the particle.
    pub position: Position,
    /// Host particle type.
    pub effect: EffectKind,
    /// Number of particles the host spawns for this request.
    pub count: u32,
    /// Random spread the host applies on each axis.
    pub spread: [f64; 3],
    /// Host speed parameter.
    pub speed: f64,
    /// Color parameters; `None` for non-colorable effects.
    pub dust: Option<DustOptions>,
}

impl EffectRequest {
    /// A single particle with no host-side spread.
    pub fn single(
        position: Position,
        effect: EffectKind,
        speed: f64,
        dust: Option<DustOptions>,
    ) -> Self {
        Self {
            position,
            effect,
            count: 1,
            spread: [0.0; 3],
            speed,
            dust,
        }
    }

    /// The color of this request, if it carries one.
    pub fn color(&self) -> Option<Rgb> {
        self.dust.map(|d| d.color)
    }
}

// ---------------------------------------------------------------------------
// Preference
// ---------------------------------------------------------------------------

/// Persisted per-player trail preference.
///
/// Created on a player's first toggle and rewritten on every toggle after
/// that; never deleted. `variant` is only meaningful while `enabled`; an
/// unset variant resolves to the configured default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    /// Whether the player wants a trail.
    #[serde(default)]
    pub enabled: bool,
    /// The chosen variant, if the player named one.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
}

impl Preference {
    /// An enabled preference with the given variant.
    pub const fn enabled(variant: Option<Variant>) -> Self {
        Self {
            enabled: true,
            variant,
        }
    }
}
