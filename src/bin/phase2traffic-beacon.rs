//! Test transmitter for the STM32WL board.
//!
//! Every press of the button on PA0 broadcasts the next phase token of a
//! fixed four-approach rotation over LoRa.
#![no_std]
#![no_main]

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pin, Pull, Speed};
use embassy_stm32::spi::Spi;
use {defmt_rtt as _, panic_probe as _};

use phase2traffic::*;

/// North, west, east and south get green in turn.
const ROTATION: [&str; 4] = [
    "GGGrrrrrrrrr",
    "rrrrrrGGGrrr",
    "rrrGGGrrrrrr",
    "rrrrrrrrrGGG",
];

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let config = create_stm32_config();
    let p = embassy_stm32::init(config);

    let mut button = ExtiInput::new(p.PA0, p.EXTI0, Pull::Up);

    // Set CTRL1 and CTRL3 for high-power transmission, while CTRL2 acts as an RF switch between tx and rx
    let ctrl1 = Output::new(p.PC4.degrade(), Level::Low, Speed::High);
    let ctrl2 = Output::new(p.PC5.degrade(), Level::Low, Speed::High);
    let ctrl3 = Output::new(p.PC3.degrade(), Level::High, Speed::High);

    let spi = Spi::new_subghz(p.SUBGHZSPI, p.DMA1_CH1, p.DMA1_CH2);
    let mut lora = unwrap!(LoraHw::new(ctrl1, ctrl2, ctrl3, spi).await);

    for token in ROTATION.iter().cycle() {
        button.wait_for_falling_edge().await;
        info!("Button pressed");
        button.wait_for_rising_edge().await;
        info!("Button released");

        match lora.send(token.as_bytes()).await {
            Ok(()) => info!("TX DONE phase = {}", token),
            Err(err) => warn!("Radio error = {}", err),
        }
    }
}
