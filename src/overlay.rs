use embassy_time::{Duration, Instant};

/// Decides when the emergency blink flips.
///
/// The scheduler holds no lamp state: [`tick`](Self::tick) only reports the
/// yellow level to show, given the current time and whether emergency is on.
#[derive(Debug, Clone)]
pub struct OverlayScheduler {
    interval: Duration,
    last_fired: Option<Instant>,
    yellow_lit: bool,
}

impl OverlayScheduler {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
            yellow_lit: false,
        }
    }

    /// Returns the yellow level to assert when the blink is due.
    ///
    /// Outside emergency the scheduler rearms, so the first tick of the next
    /// emergency fires at once with yellow lit.
    pub fn tick(&mut self, now: Instant, emergency_active: bool) -> Option<bool> {
        if !emergency_active {
            self.last_fired = None;
            self.yellow_lit = false;
            return None;
        }

        if let Some(last) = self.last_fired {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }

        self.last_fired = Some(now);
        self.yellow_lit = !self.yellow_lit;

        Some(self.yellow_lit)
    }

    pub fn yellow_lit(&self) -> bool {
        self.yellow_lit
    }
}
