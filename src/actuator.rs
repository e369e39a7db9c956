use embedded_hal::digital::OutputPin;

use crate::{Direction, PhaseConfiguration};

/// Something that can show a [`PhaseConfiguration`].
///
/// The state machine only talks to lamps through this trait, so the board
/// outputs and a test double are interchangeable.
pub trait LampActuator {
    fn apply(&mut self, config: &PhaseConfiguration);
}

impl<A: LampActuator + ?Sized> LampActuator for &mut A {
    fn apply(&mut self, config: &PhaseConfiguration) {
        (**self).apply(config)
    }
}

/// Electrical level that turns a lamp on.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveHigh,
    /// Lamp driven through a low-side switch: low is lit.
    ActiveLow,
}

/// Output pins of one signal head.
pub struct DirectionPins<P> {
    pub green: P,
    pub yellow: P,
    pub red: P,
}

/// Lamps wired straight to GPIO outputs.
pub struct GpioLamps<P> {
    heads: [DirectionPins<P>; 4],
    polarity: Polarity,
}

impl<P> GpioLamps<P>
where
    P: OutputPin<Error = core::convert::Infallible>,
{
    /// `heads` are given in north, east, west, south order.
    pub fn new(heads: [DirectionPins<P>; 4], polarity: Polarity) -> Self {
        Self { heads, polarity }
    }

    pub fn release(self) -> [DirectionPins<P>; 4] {
        self.heads
    }
}

impl<P> LampActuator for GpioLamps<P>
where
    P: OutputPin<Error = core::convert::Infallible>,
{
    fn apply(&mut self, config: &PhaseConfiguration) {
        for (direction, head) in Direction::ALL.into_iter().zip(self.heads.iter_mut()) {
            let lights = config[direction];
            drive(&mut head.green, lights.green, self.polarity);
            drive(&mut head.yellow, lights.yellow, self.polarity);
            drive(&mut head.red, lights.red, self.polarity);
        }
    }
}

pub(crate) fn drive<P>(pin: &mut P, lit: bool, polarity: Polarity)
where
    P: OutputPin<Error = core::convert::Infallible>,
{
    let result = match (lit, polarity) {
        (true, Polarity::ActiveHigh) | (false, Polarity::ActiveLow) => pin.set_high(),
        (false, Polarity::ActiveHigh) | (true, Polarity::ActiveLow) => pin.set_low(),
    };
    match result {
        Ok(()) => {}
        Err(never) => match never {},
    }
}
