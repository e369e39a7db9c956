//! Glue between lora-phy and the sub-GHz radio built into the STM32WL.

use embassy_stm32::interrupt::typelevel::{Binding, Handler, SUBGHZ_RADIO};
use embassy_stm32::interrupt::{self, InterruptExt};
use embassy_stm32::pac;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::{ErrorType, Operation, SpiBus, SpiDevice};
use lora_phy::mod_params::RadioError;
use lora_phy::mod_params::RadioError::{Reset, RfSwitchRx, RfSwitchTx};
use lora_phy::mod_traits::InterfaceVariant;

static IRQ_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Wakes the radio driver on `SUBGHZ_RADIO`.
pub struct InterruptHandler {}

impl Handler<SUBGHZ_RADIO> for InterruptHandler {
    unsafe fn on_interrupt() {
        interrupt::SUBGHZ_RADIO.disable();
        IRQ_SIGNAL.signal(());
    }
}

/// The sub-GHz SPI bus has no chip select pin; NSS is a PWR register bit.
pub struct SubghzSpiDevice<T>(pub T);

impl<T: SpiBus> ErrorType for SubghzSpiDevice<T> {
    type Error = T::Error;
}

impl<T: SpiBus> SpiDevice for SubghzSpiDevice<T> {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        pac::PWR.subghzspicr().modify(|w| w.set_nss(false));

        for operation in operations {
            match operation {
                Operation::Read(buf) => self.0.read(buf).await?,
                Operation::Write(buf) => self.0.write(buf).await?,
                Operation::Transfer(read, write) => self.0.transfer(read, write).await?,
                Operation::TransferInPlace(buf) => self.0.transfer_in_place(buf).await?,
                Operation::DelayNs(_) => {}
            }
        }
        self.0.flush().await?;

        pac::PWR.subghzspicr().modify(|w| w.set_nss(true));

        Ok(())
    }
}

/// RF switch control of the Nucleo-WL55 style front end.
///
/// | state   | CTRL1 | CTRL2 | CTRL3 |
/// |---------|-------|-------|-------|
/// | off     | 0     | 0     | 0     |
/// | rx      | 1     | 0     | 1     |
/// | tx (lp) | 1     | 1     | 1     |
/// | tx (hp) | 0     | 1     | 1     |
pub struct Stm32wlInterfaceVariant<CTRL> {
    use_high_power_pa: bool,
    ctrl1: Option<CTRL>,
    ctrl2: Option<CTRL>,
    ctrl3: Option<CTRL>,
}

impl<CTRL> Stm32wlInterfaceVariant<CTRL>
where
    CTRL: OutputPin,
{
    pub fn new(
        _irq: impl Binding<SUBGHZ_RADIO, InterruptHandler>,
        use_high_power_pa: bool,
        ctrl1: Option<CTRL>,
        ctrl2: Option<CTRL>,
        ctrl3: Option<CTRL>,
    ) -> Result<Self, RadioError> {
        interrupt::SUBGHZ_RADIO.disable();
        Ok(Self {
            use_high_power_pa,
            ctrl1,
            ctrl2,
            ctrl3,
        })
    }

    fn set_switch(
        &mut self,
        levels: [bool; 3],
        error: impl Fn() -> RadioError,
    ) -> Result<(), RadioError> {
        let pins = [&mut self.ctrl1, &mut self.ctrl2, &mut self.ctrl3];
        for (pin, high) in pins.into_iter().zip(levels) {
            if let Some(pin) = pin {
                let result = if high { pin.set_high() } else { pin.set_low() };
                result.map_err(|_| error())?;
            }
        }
        Ok(())
    }
}

impl<CTRL> InterfaceVariant for Stm32wlInterfaceVariant<CTRL>
where
    CTRL: OutputPin,
{
    async fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), RadioError> {
        pac::RCC.csr().modify(|w| w.set_rfrst(true));
        delay.delay_ms(1).await;
        pac::RCC.csr().modify(|w| w.set_rfrst(false));
        if pac::RCC.csr().read().rfrst() {
            return Err(Reset);
        }
        Ok(())
    }

    async fn wait_on_busy(&mut self) -> Result<(), RadioError> {
        while pac::PWR.sr2().read().rfbusys() {}
        Ok(())
    }

    async fn await_irq(&mut self) -> Result<(), RadioError> {
        unsafe { interrupt::SUBGHZ_RADIO.enable() };
        IRQ_SIGNAL.wait().await;
        Ok(())
    }

    async fn enable_rf_switch_rx(&mut self) -> Result<(), RadioError> {
        self.set_switch([true, false, true], || RfSwitchRx)
    }

    async fn enable_rf_switch_tx(&mut self) -> Result<(), RadioError> {
        let ctrl1 = !self.use_high_power_pa;
        self.set_switch([ctrl1, true, true], || RfSwitchTx)
    }

    async fn disable_rf_switch(&mut self) -> Result<(), RadioError> {
        self.set_switch([false, false, false], || RfSwitchRx)
    }
}
