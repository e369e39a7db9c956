use embassy_time::Duration;

use crate::Polarity;

/// Returned by the probe request.
pub const IDENTIFICATION: &str = concat!("phase2traffic/", env!("CARGO_PKG_VERSION"));

/// Timing and wiring of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Period of the yellow blink while emergency is active.
    pub blink_interval: Duration,
    /// On/off cycles of a high priority emergency flash burst.
    pub flash_cycles: u8,
    /// Half period of a flash burst cycle.
    pub flash_step: Duration,
    pub high_alert: Duration,
    pub low_alert: Duration,
    /// How long each colour is held during a lamp self-test.
    pub sweep_step: Duration,
    pub lamp_polarity: Polarity,
    pub siren_polarity: Polarity,
    pub identification: &'static str,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blink_interval: Duration::from_millis(500),
            flash_cycles: 3,
            flash_step: Duration::from_millis(250),
            high_alert: Duration::from_millis(1000),
            low_alert: Duration::from_millis(200),
            sweep_step: Duration::from_millis(300),
            lamp_polarity: Polarity::ActiveLow,
            siren_polarity: Polarity::ActiveHigh,
            identification: IDENTIFICATION,
        }
    }
}

pub(crate) fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
