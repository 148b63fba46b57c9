//! Hold gesture detection over a stream of pointer button events.
//!
//! Events are stamped with an [`Instant`] at the source, so hold
//! durations are unaffected by channel latency or a busy runtime.

use std::time::{Duration, Instant};

use tracing::debug;

/// Capacity of the pointer event channel. The hook drops events beyond
/// this rather than blocking the input thread.
pub const EVENT_BUFFER: usize = 64;

/// One primary-button transition, stamped where it was observed.
#[derive(Debug, Clone, Copy)]
pub enum PointerEvent {
    Pressed { at: Instant },
    Released { at: Instant },
}

/// Emitted when a press was held at least as long as the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    /// How long the button was actually held.
    pub held: Duration,
}

/// Press/release state machine.
///
/// Feed it pointer events; it emits a [`Trigger`] on any release whose
/// press lasted at least `threshold`. The threshold is sampled at
/// release time, so runtime configuration changes apply to the gesture
/// in progress.
#[derive(Debug, Default)]
pub struct GestureDetector {
    pressed_at: Option<Instant>,
}

impl GestureDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event(&mut self, event: PointerEvent, threshold: Duration) -> Option<Trigger> {
        match event {
            PointerEvent::Pressed { at } => {
                // A duplicate press replaces the pending session; only
                // the most recent press governs the next release.
                self.pressed_at = Some(at);
                None
            }
            PointerEvent::Released { at } => {
                let pressed_at = self.pressed_at.take()?;
                let held = at.saturating_duration_since(pressed_at);
                if held >= threshold {
                    debug!(held_ms = held.as_millis() as u64, "Hold gesture detected");
                    Some(Trigger { held })
                } else {
                    None
                }
            }
        }
    }
}
