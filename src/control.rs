use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Instant;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::arbiter::{Arbiter, Effect};
use crate::ingress::Inbox;
use crate::machine::SignalMachine;
use crate::overlay::OverlayScheduler;
use crate::siren::{AlertLevel, Siren};
use crate::{Config, LampActuator};

/// One cooperative service loop around the arbiter.
///
/// [`service`](Self::service) is called once per loop iteration with the
/// current time; it never waits for input.
pub struct ControlLoop<A, P, D> {
    arbiter: Arbiter<A>,
    overlay: OverlayScheduler,
    siren: Siren<P>,
    delay: D,
    config: Config,
}

impl<A, P, D> ControlLoop<A, P, D>
where
    A: LampActuator,
    P: OutputPin<Error = core::convert::Infallible>,
    D: DelayNs,
{
    /// Lamps start in all stop.
    pub fn new(lamps: A, siren: P, delay: D, config: Config, booted_at: Instant) -> Self {
        Self {
            arbiter: Arbiter::new(SignalMachine::new(lamps, booted_at), config.identification),
            overlay: OverlayScheduler::new(config.blink_interval),
            siren: Siren::new(siren, config.siren_polarity),
            delay,
            config,
        }
    }

    pub fn arbiter(&self) -> &Arbiter<A> {
        &self.arbiter
    }

    pub fn arbiter_mut(&mut self) -> &mut Arbiter<A> {
        &mut self.arbiter
    }

    /// Services the requests buffered when the iteration started, at most one
    /// datagram, then the emergency blink.
    pub async fn service<M: RawMutex>(&mut self, inbox: &Inbox<M>, now: Instant) {
        for _ in 0..inbox.pending_requests() {
            let Some(line) = inbox.poll_request() else {
                break;
            };
            let outcome = self.arbiter.handle_bytes(&line, now);
            if !inbox.respond(outcome.response) {
                warn!("response queue full, answer lost");
            }
            if let Some(effect) = outcome.effect {
                self.perform(effect).await;
            }
        }

        if let Some(datagram) = inbox.poll_datagram() {
            self.arbiter.submit_datagram(&datagram, now);
        }

        self.tick(now);
    }

    /// Evaluates the emergency blink.
    pub fn tick(&mut self, now: Instant) {
        let emergency_active = self.arbiter.machine().state().emergency_active();
        if let Some(yellow_lit) = self.overlay.tick(now, emergency_active) {
            self.arbiter.machine_mut().show_overlay(yellow_lit);
        }
    }

    pub async fn perform(&mut self, effect: Effect) {
        debug!("effect {:?}", effect);
        match effect {
            Effect::FlashBurst => {
                let (cycles, step) = (self.config.flash_cycles, self.config.flash_step);
                self.arbiter
                    .machine_mut()
                    .flash_yellow(&mut self.delay, cycles, step)
                    .await;
                self.alert(AlertLevel::Long).await;
            }
            Effect::Alert(level) => self.alert(level).await,
            Effect::LampSweep => self.self_test().await,
        }
    }

    /// Lights every lamp colour in turn, then restores the stored phase.
    pub async fn self_test(&mut self) {
        let step = self.config.sweep_step;
        self.arbiter
            .machine_mut()
            .lamp_sweep(&mut self.delay, step)
            .await;
    }

    async fn alert(&mut self, level: AlertLevel) {
        let length = match level {
            AlertLevel::Long => self.config.high_alert,
            AlertLevel::Short => self.config.low_alert,
        };
        self.siren.sound(&mut self.delay, length).await;
    }
}
