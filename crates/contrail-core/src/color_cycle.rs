//! Shared rainbow color cycle.
//!
//! One [`ColorCycle`] is shared by every emitter in the process. Each
//! rainbow firing paints its whole burst in the color at the current index
//! and then advances the index by exactly one. The index lives behind a
//! mutex that is held for the whole burst, so concurrent firings from
//! different players interleave in some order but never observe the same
//! index twice and never lose an advance.

use std::sync::{Mutex, PoisonError};

use contrail_types::Rgb;

/// The seven-color rainbow palette, in cycle order.
pub const RAINBOW: [Rgb; 7] = [
    Rgb::new(255, 0, 75),
    Rgb::new(255, 111, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(0, 224, 4),
    Rgb::new(0, 17, 255),
    Rgb::new(255, 0, 153),
    Rgb::new(152, 3, 252),
];

/// Errors that can occur when building a color cycle.
#[derive(Debug, thiserror::Error)]
pub enum ColorCycleError {
    /// A cycle needs at least one color.
    #[error("color cycle palette is empty")]
    EmptyPalette,
}

/// A fixed palette with a single rotating index.
#[derive(Debug)]
pub struct ColorCycle {
    palette: Vec<Rgb>,
    index: Mutex<usize>,
}

impl ColorCycle {
    /// Create a cycle over `palette`, starting at index 0.
    ///
    /// # Errors
    ///
    /// Returns [`ColorCycleError::EmptyPalette`] if `palette` is empty.
    pub fn new(palette: Vec<Rgb>) -> Result<Self, ColorCycleError> {
        if palette.is_empty() {
            return Err(ColorCycleError::EmptyPalette);
        }
        Ok(Self {
            palette,
            index: Mutex::new(0),
        })
    }

    /// The standard rainbow cycle.
    pub fn rainbow() -> Self {
        Self {
            palette: RAINBOW.to_vec(),
            index: Mutex::new(0),
        }
    }

    /// Number of colors in the palette.
    pub fn len(&self) -> usize {
        self.palette.len()
    }

    /// Always false; construction rejects empty palettes.
    pub fn is_empty(&self) -> bool {
        self.palette.is_empty()
    }

    /// Current index into the palette.
    pub fn index(&self) -> usize {
        *self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Color at the current index.
    pub fn current(&self) -> Rgb {
        self.color_at(self.index())
    }

    /// Run one firing with the current color, then advance the index.
    ///
    /// The index is locked for the duration of `paint`, so no other firing
    /// can read or advance it until this one has finished its burst.
    pub fn paint_and_advance<R>(&self, paint: impl FnOnce(Rgb) -> R) -> R {
        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        let result = paint(self.color_at(*index));
        *index = self.next_index(*index);
        result
    }

    fn color_at(&self, index: usize) -> Rgb {
        // index < len is maintained by next_index
        self.palette.get(index).copied().unwrap_or(Rgb::WHITE)
    }

    fn next_index(&self, index: usize) -> usize {
        index
            .wrapping_add(1)
            .checked_rem(self.palette.len())
            .unwrap_or(0)
    }
}

impl Default for ColorCycle {
    fn default() -> Self {
        Self::rainbow()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn empty_palette_is_rejected() {
        assert!(matches!(
            ColorCycle::new(Vec::new()),
            Err(ColorCycleError::EmptyPalette)
        ));
    }

    #[test]
    fn paint_uses_current_then_advances() {
        let cycle = ColorCycle::rainbow();
        let seen = cycle.paint_and_advance(|color| color);
        assert_eq!(seen, RAINBOW[0]);
        assert_eq!(cycle.index(), 1);
        assert_eq!(cycle.current(), RAINBOW[1]);
    }

    #[test]
    fn full_rotation_returns_to_start() {
        let cycle = ColorCycle::rainbow();
        for _ in 0..(RAINBOW.len() * 3) {
            cycle.paint_and_advance(|_| ());
        }
        assert_eq!(cycle.index(), 0);
    }

    #[test]
    fn single_color_cycle_stays_put() {
        let cycle = ColorCycle::new(vec![Rgb::GRAY]).unwrap();
        cycle.paint_and_advance(|_| ());
        assert_eq!(cycle.index(), 0);
        assert_eq!(cycle.current(), Rgb::GRAY);
    }

    #[test]
    fn concurrent_firings_never_lose_an_advance() {
        let cycle = Arc::new(ColorCycle::rainbow());
        let observed = Arc::new(Mutex::new(Vec::new()));

        let threads: Vec<_> = (0..100)
            .map(|_| {
                let cycle = Arc::clone(&cycle);
                let observed = Arc::clone(&observed);
                std::thread::spawn(move || {
                    cycle.paint_and_advance(|color| observed.lock().unwrap().push(color));
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        // 100 = 14 * 7 + 2
        assert_eq!(cycle.index(), 2);

        // Firings are serialized in cycle order: each color is seen 14 or
        // 15 times and consecutive observations follow the palette.
        let observed = observed.lock().unwrap();
        assert_eq!(observed.len(), 100);
        for (i, color) in observed.iter().enumerate() {
            assert_eq!(*color, RAINBOW[i % RAINBOW.len()]);
        }
    }
}
