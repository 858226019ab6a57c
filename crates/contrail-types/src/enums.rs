//! Enumeration types for the Contrail service.

use serde::{Deserialize, Serialize};

/// A named trail style selecting how a firing colors its particles.
///
/// The set is open to extension: adding a variant means adding a case
/// here and a generation strategy in the core variant resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Every particle of a firing shares one color from the shared
    /// rainbow cycle; the cycle advances once per firing.
    Rainbow,
    /// White and gray particles from a fixed palette.
    Cloud,
}

impl Variant {
    /// Every variant, in the order offered to players.
    pub const ALL: [Self; 2] = [Self::Rainbow, Self::Cloud];

    /// The lowercase name used in commands and persisted preferences.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rainbow => "rainbow",
            Self::Cloud => "cloud",
        }
    }
}

impl core::fmt::Display for Variant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string does not name a known [`Variant`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trail variant: {name}")]
pub struct ParseVariantError {
    /// The rejected input.
    pub name: String,
}

impl core::str::FromStr for Variant {
    type Err = ParseVariantError;

    /// Parse a variant name, ignoring ASCII case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseVariantError {
                name: trimmed.to_owned(),
            })
    }
}
