//! Render sink for the console simulation.
//!
//! There is no client to draw particles, so each request is logged at
//! `debug` and counted.

use std::sync::atomic::{AtomicU64, Ordering};

use contrail_core::host::RenderSink;
use contrail_types::EffectRequest;
use tracing::debug;

/// A [`RenderSink`] that logs and counts every request.
#[derive(Debug, Default)]
pub struct LoggingSink {
    emitted: AtomicU64,
}

impl LoggingSink {
    /// Create a sink with a zero count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Acquire)
    }
}

impl RenderSink for LoggingSink {
    fn emit(&self, request: &EffectRequest) {
        self.emitted.fetch_add(1, Ordering::AcqRel);
        debug!(
            effect = %request.effect,
            world = %request.position.world,
            x = request.position.x,
            y = request.position.y,
            z = request.position.z,
            speed = request.speed,
            color = request.color().map(|c| c.to_string()),
            "Particle spawned"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use contrail_types::{EffectKind, Position};

    use super::*;

    #[test]
    fn counts_every_request() {
        let sink = LoggingSink::new();
        let request = EffectRequest::single(
            Position::new("overworld", 1.0, 2.0, 3.0),
            EffectKind::new("FLAME"),
            0.0,
            None,
        );
        sink.emit(&request);
        sink.emit(&request);
        assert_eq!(sink.emitted(), 2);
    }
}
