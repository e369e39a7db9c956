use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embassy_time::Duration;

use crate::actuator::drive;
use crate::Polarity;

/// How loud the intersection should be about an emergency notice.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Long,
    Short,
}

/// Buzzer on a single output pin.
pub struct Siren<P> {
    pin: P,
    polarity: Polarity,
}

impl<P> Siren<P>
where
    P: OutputPin<Error = core::convert::Infallible>,
{
    /// Creates the siren silenced.
    pub fn new(pin: P, polarity: Polarity) -> Self {
        let mut siren = Self { pin, polarity };
        siren.set(false);

        siren
    }

    /// Sounds for `length`, then falls silent.
    pub async fn sound<D: DelayNs>(&mut self, delay: &mut D, length: Duration) {
        debug!("siren on for {} ms", length.as_millis());
        self.set(true);
        delay.delay_ms(crate::config::millis(length)).await;
        self.set(false);
    }

    fn set(&mut self, on: bool) {
        drive(&mut self.pin, on, self.polarity);
    }
}
