//! Intersection controller for the STM32WL board.
//!
//! Phase tokens arrive as LoRa packets (best effort) and as text lines on
//! USART1 (reliable, every line is answered). Twelve lamp outputs drive the
//! four signal heads and PA15 drives the siren.
#![no_std]
#![no_main]

use core::fmt::Write;

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{AnyPin, Level, Output, Pin, Speed};
use embassy_stm32::mode::Async;
use embassy_stm32::spi::Spi;
use embassy_stm32::usart::{self, RingBufferedUartRx, Uart, UartTx};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_time::{Delay, Duration, Instant, Timer};
use heapless::String;
use {defmt_rtt as _, panic_probe as _};

use phase2traffic::ingress::RequestLine;
use phase2traffic::*;

/// Pause between control loop iterations.
const LOOP_YIELD: Duration = Duration::from_millis(10);
/// Longest response line, terminator excluded.
const MAX_RESPONSE_LEN: usize = 512;
/// Serial input buffered by DMA while a request is being serviced.
const RX_RING_LEN: usize = 256;

static INBOX: Inbox<ThreadModeRawMutex> = Inbox::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let config = create_stm32_config();
    let p = embassy_stm32::init(config);

    // Set CTRL1 and CTRL3 for high-power transmission, while CTRL2 acts as an RF switch between tx and rx
    let ctrl1 = Output::new(p.PC4.degrade(), Level::Low, Speed::High);
    let ctrl2 = Output::new(p.PC5.degrade(), Level::Low, Speed::High);
    let ctrl3 = Output::new(p.PC3.degrade(), Level::High, Speed::High);

    let config = Config::default();
    let lamps = GpioLamps::new(
        [
            head(p.PC6.degrade(), p.PC0.degrade(), p.PA8.degrade(), config.lamp_polarity),
            head(p.PB3.degrade(), p.PB4.degrade(), p.PB5.degrade(), config.lamp_polarity),
            head(p.PB10.degrade(), p.PB13.degrade(), p.PB14.degrade(), config.lamp_polarity),
            head(p.PB15.degrade(), p.PA9.degrade(), p.PA10.degrade(), config.lamp_polarity),
        ],
        config.lamp_polarity,
    );
    let siren = Output::new(p.PA15.degrade(), off_level(config.siren_polarity), Speed::Low);
    let mut control = ControlLoop::new(lamps, siren, Delay, config, Instant::now());

    // Startup checks.
    control.self_test().await;
    info!("{} ready", IDENTIFICATION);

    let spi = Spi::new_subghz(p.SUBGHZSPI, p.DMA1_CH1, p.DMA1_CH2);
    let lora = unwrap!(LoraHw::new(ctrl1, ctrl2, ctrl3, spi).await);
    unwrap!(spawner.spawn(radio_task(lora)));

    let uart = unwrap!(Uart::new(
        p.USART1,
        p.PB7,
        p.PB6,
        Irqs,
        p.DMA1_CH3,
        p.DMA1_CH4,
        usart::Config::default(),
    ));
    let (tx, rx) = uart.split();
    let rx_ring = unwrap!(cortex_m::singleton!(: [u8; RX_RING_LEN] = [0; RX_RING_LEN]));
    unwrap!(spawner.spawn(serial_task(tx, rx.into_ring_buffered(rx_ring))));

    loop {
        control.service(&INBOX, Instant::now()).await;
        Timer::after(LOOP_YIELD).await;
    }
}

#[embassy_executor::task]
async fn radio_task(mut lora: LoraHw) {
    loop {
        match lora.receive().await {
            Ok(datagram) => {
                if !INBOX.offer_datagram(datagram) {
                    warn!("datagram queue full, packet dropped");
                }
            }
            Err(err) => {
                warn!("Radio error = {}", err);
                Timer::after_secs(1).await;
            }
        }
    }
}

/// Reads request lines and writes one answer per line.
///
/// Reception runs into a DMA ring buffer, so bytes keep arriving while the
/// task waits for the control loop to answer.
#[embassy_executor::task]
async fn serial_task(mut tx: UartTx<'static, Async>, mut rx: RingBufferedUartRx<'static>) {
    let mut chunk = [0u8; 32];
    let mut line = RequestLine::new();
    let mut overflowed = false;

    loop {
        let count = match rx.read(&mut chunk).await {
            Ok(count) => count,
            Err(err) => {
                // The ring restarts after an overrun; the partial line is gone.
                warn!("serial rx error = {}", err);
                line.clear();
                overflowed = false;
                continue;
            }
        };

        for &byte in &chunk[..count] {
            match byte {
                b'\r' => {}
                b'\n' => {
                    let response = if overflowed {
                        Response::Malformed(TransportError::Oversized)
                    } else {
                        INBOX.request(line.clone()).await
                    };
                    line.clear();
                    overflowed = false;
                    reply(&mut tx, &response).await;
                }
                _ => {
                    if line.push(byte).is_err() {
                        overflowed = true;
                    }
                }
            }
        }
    }
}

async fn reply(tx: &mut UartTx<'static, Async>, response: &Response) {
    let mut text: String<MAX_RESPONSE_LEN> = String::new();
    if write!(text, "{}", response).is_err() {
        warn!("response truncated");
    }
    for bytes in [text.as_bytes(), b"\r\n"] {
        if let Err(err) = tx.write(bytes).await {
            warn!("serial tx error = {}", err);
            return;
        }
    }
}

fn head(green: AnyPin, yellow: AnyPin, red: AnyPin, polarity: Polarity) -> DirectionPins<Output<'static>> {
    let off = off_level(polarity);
    DirectionPins {
        green: Output::new(green, off, Speed::High),
        yellow: Output::new(yellow, off, Speed::High),
        red: Output::new(red, off, Speed::High),
    }
}

fn off_level(polarity: Polarity) -> Level {
    match polarity {
        Polarity::ActiveHigh => Level::Low,
        Polarity::ActiveLow => Level::High,
    }
}
