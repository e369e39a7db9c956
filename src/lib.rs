#![cfg_attr(not(test), no_std)]

// This must go first so the logging macros are visible everywhere.
mod fmt;

mod actuator;
pub use actuator::*;
mod arbiter;
pub use arbiter::*;
pub mod codec;
pub use codec::{PhaseToken, ALL_RED_TOKEN, MAX_TOKEN_BYTES, TOKEN_LEN};
mod config;
pub use config::*;
mod control;
pub use control::ControlLoop;
mod error;
pub use error::*;
mod history;
pub use history::*;
pub mod ingress;
pub use ingress::Inbox;
mod machine;
pub use machine::*;
mod overlay;
pub use overlay::*;
pub mod protocol;
pub use protocol::{Request, Response};
mod signal;
pub use signal::*;
mod siren;
pub use siren::*;

#[cfg(feature = "board")]
mod iv;
#[cfg(feature = "board")]
pub use iv::*;
#[cfg(feature = "board")]
mod lora;
#[cfg(feature = "board")]
pub use lora::*;

#[cfg(feature = "board")]
embassy_stm32::bind_interrupts!(pub struct Irqs{
    SUBGHZ_RADIO => InterruptHandler;
    USART1 => embassy_stm32::usart::InterruptHandler<embassy_stm32::peripherals::USART1>;
});

#[cfg(feature = "board")]
pub fn create_stm32_config() -> embassy_stm32::Config {
    let mut config = embassy_stm32::Config::default();
    {
        use embassy_stm32::{rcc::*, time::Hertz};
        config.rcc.hse = Some(Hse {
            freq: Hertz(32_000_000),
            mode: HseMode::Bypass,
            prescaler: HsePrescaler::DIV1,
        });
        config.rcc.sys = Sysclk::PLL1_R;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSE,
            prediv: PllPreDiv::DIV2,
            mul: PllMul::MUL6,
            divp: None,
            divq: Some(PllQDiv::DIV2), // PLL1_Q clock (32 / 2 * 6 / 2), used for RNG
            divr: Some(PllRDiv::DIV2), // sysclk 48Mhz clock (32 / 2 * 6 / 2)
        });
    }

    config
}
