use embassy_time::{Duration, Instant};
use embedded_hal_async::delay::DelayNs;

use crate::codec::{self, PhaseToken, ALL_RED_TOKEN};
use crate::config::millis;
use crate::{DecodeError, DirectionLights, LampActuator, LampState, PhaseConfiguration};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The stored configuration is shown verbatim.
    Normal,
    /// Yellow lamps are periodically overridden by the blink overlay.
    Emergency,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseResult {
    Accepted,
    /// The token was refused and the intersection fell back to all stop.
    Rejected(DecodeError),
}

/// The authoritative controller state. Only [`SignalMachine`] writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    token: PhaseToken,
    configuration: PhaseConfiguration,
    duration_secs: u32,
    emergency_active: bool,
}

impl ControllerState {
    fn all_stop() -> Self {
        Self {
            token: all_red_token(),
            configuration: PhaseConfiguration::ALL_RED,
            duration_secs: 0,
            emergency_active: false,
        }
    }

    /// Last accepted token, as received.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn configuration(&self) -> &PhaseConfiguration {
        &self.configuration
    }

    /// Advisory only, nothing times the phase out.
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn emergency_active(&self) -> bool {
        self.emergency_active
    }

    pub fn mode(&self) -> Mode {
        if self.emergency_active {
            Mode::Emergency
        } else {
            Mode::Normal
        }
    }
}

fn all_red_token() -> PhaseToken {
    let mut token = PhaseToken::new();
    let _ = token.push_str(ALL_RED_TOKEN);
    token
}

/// Point-in-time view of the controller for the status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub token: PhaseToken,
    pub canonical: PhaseToken,
    pub duration_secs: u32,
    pub emergency_active: bool,
    pub uptime: Duration,
    pub configuration: PhaseConfiguration,
}

/// Owns the controller state and the lamps it is shown on.
pub struct SignalMachine<A> {
    actuator: A,
    state: ControllerState,
    booted_at: Instant,
}

impl<A: LampActuator> SignalMachine<A> {
    /// Starts in all stop, which is asserted right away.
    pub fn new(actuator: A, booted_at: Instant) -> Self {
        let mut machine = Self {
            actuator,
            state: ControllerState::all_stop(),
            booted_at,
        };
        machine.force_all_stop();

        machine
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn uptime(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.booted_at)
    }

    pub fn apply_phase(&mut self, token: &str, duration_secs: Option<u32>) -> PhaseResult {
        let configuration = match codec::decode(token) {
            Ok(configuration) => configuration,
            Err(err) => {
                warn!("phase {} rejected: {}", token, err);
                self.force_all_stop();
                return PhaseResult::Rejected(err);
            }
        };

        // A decoded token is at most MAX_TOKEN_BYTES long, so it always fits.
        let mut raw = PhaseToken::new();
        let _ = raw.push_str(token);

        self.state.token = raw;
        self.state.configuration = configuration;
        self.state.duration_secs = duration_secs.unwrap_or(0);
        info!(
            "phase {} for {} s",
            self.state.token.as_str(),
            self.state.duration_secs
        );
        self.actuator.apply(&self.state.configuration);

        PhaseResult::Accepted
    }

    pub fn raise_emergency(&mut self) {
        if !self.state.emergency_active {
            info!("emergency raised");
        }
        self.state.emergency_active = true;
    }

    /// Drops the overlay and shows the stored configuration again.
    pub fn clear_emergency(&mut self) {
        if self.state.emergency_active {
            info!("emergency cleared");
        }
        self.state.emergency_active = false;
        self.actuator.apply(&self.state.configuration);
    }

    pub fn force_all_stop(&mut self) {
        debug!("all stop");
        self.state = ControllerState::all_stop();
        self.actuator.apply(&self.state.configuration);
    }

    /// Shows the stored configuration with every yellow lamp forced to
    /// `yellow_lit`. Does nothing outside emergency mode.
    pub fn show_overlay(&mut self, yellow_lit: bool) {
        if self.state.emergency_active {
            trace!("overlay yellow = {}", yellow_lit);
            self.actuator
                .apply(&self.state.configuration.with_yellow(yellow_lit));
        }
    }

    /// Blinks every yellow lamp `cycles` times, then shows the stored
    /// configuration.
    pub async fn flash_yellow<D: DelayNs>(&mut self, delay: &mut D, cycles: u8, step: Duration) {
        for _ in 0..cycles {
            self.actuator
                .apply(&self.state.configuration.with_yellow(true));
            delay.delay_ms(millis(step)).await;
            self.actuator
                .apply(&self.state.configuration.with_yellow(false));
            delay.delay_ms(millis(step)).await;
        }
        self.actuator.apply(&self.state.configuration);
    }

    /// Lamp self-test: every head red, then yellow, then green, then back to
    /// the stored configuration.
    pub async fn lamp_sweep<D: DelayNs>(&mut self, delay: &mut D, step: Duration) {
        let mut lamp = LampState::Red;
        for _ in 0..3 {
            debug!("self-test {}", lamp);
            self.actuator
                .apply(&PhaseConfiguration::uniform(DirectionLights::single(lamp)));
            lamp.rotate();
            delay.delay_ms(millis(step)).await;
        }
        self.actuator.apply(&self.state.configuration);
    }

    pub fn snapshot(&self, now: Instant) -> StatusReport {
        StatusReport {
            token: self.state.token.clone(),
            canonical: codec::encode(&self.state.configuration),
            duration_secs: self.state.duration_secs,
            emergency_active: self.state.emergency_active,
            uptime: self.uptime(now),
            configuration: self.state.configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::tests::Recorder;
    use crate::control::tests::CountingDelay;
    use crate::Direction;

    fn machine() -> SignalMachine<Recorder> {
        SignalMachine::new(Recorder::default(), Instant::from_secs(0))
    }

    fn north_green() -> PhaseConfiguration {
        let mut config = PhaseConfiguration::ALL_RED;
        config[Direction::North] = DirectionLights::single(LampState::Green);
        config
    }

    #[test]
    fn boots_into_all_stop() {
        let machine = machine();
        assert_eq!(machine.state().token(), ALL_RED_TOKEN);
        assert_eq!(machine.state().mode(), Mode::Normal);
        assert_eq!(machine.actuator().shown, [PhaseConfiguration::ALL_RED]);
    }

    #[test]
    fn accepted_phase_is_asserted() {
        let mut machine = machine();
        assert_eq!(
            machine.apply_phase("GGGrrrrrrrrr", Some(30)),
            PhaseResult::Accepted
        );
        assert_eq!(machine.state().token(), "GGGrrrrrrrrr");
        assert_eq!(machine.state().duration_secs(), 30);
        assert_eq!(machine.actuator().last(), Some(north_green()));
    }

    #[test]
    fn multibyte_token_is_stored_verbatim() {
        let mut machine = machine();
        // Twelve characters, 21 bytes.
        let token = "GGGéééééérrr";
        assert_eq!(machine.apply_phase(token, None), PhaseResult::Accepted);
        assert_eq!(machine.state().token(), token);
        assert_eq!(machine.snapshot(Instant::from_secs(1)).canonical, "GGGoooooorrr");
    }

    #[test]
    fn wrong_length_forces_all_stop() {
        for token in ["", "GGG", "GGGrrrrrrrr", "GGGrrrrrrrrrr"] {
            let mut machine = machine();
            machine.apply_phase("GGGrrrrrrrrr", Some(30));
            machine.raise_emergency();

            assert_eq!(
                machine.apply_phase(token, Some(5)),
                PhaseResult::Rejected(DecodeError::InvalidLength)
            );
            assert_eq!(machine.state().configuration(), &PhaseConfiguration::ALL_RED);
            assert_eq!(machine.state().token(), ALL_RED_TOKEN);
            assert!(!machine.state().emergency_active());
            assert_eq!(machine.actuator().last(), Some(PhaseConfiguration::ALL_RED));
        }
    }

    #[test]
    fn later_phase_replaces_earlier_entirely() {
        let mut machine = machine();
        machine.apply_phase("GGGrrrrrrrrr", Some(30));
        machine.apply_phase("rrrrrrrrrGGG", None);

        let mut expected = PhaseConfiguration::ALL_RED;
        expected[Direction::South] = DirectionLights::single(LampState::Green);
        assert_eq!(machine.state().configuration(), &expected);
        assert_eq!(machine.state().token(), "rrrrrrrrrGGG");
        assert_eq!(machine.state().duration_secs(), 0);
    }

    #[test]
    fn emergency_and_phase_are_orthogonal() {
        let mut machine = machine();
        machine.apply_phase("GGGrrrrrrrrr", Some(30));
        machine.raise_emergency();
        assert_eq!(machine.state().configuration(), &north_green());
        assert_eq!(machine.state().mode(), Mode::Emergency);

        machine.apply_phase("rrrGGGrrrrrr", Some(10));
        assert!(machine.state().emergency_active());
    }

    #[test]
    fn clearing_emergency_restores_stored_phase() {
        let mut machine = machine();
        machine.apply_phase("GGGrrrrrrrrr", Some(30));
        let before = *machine.state().configuration();

        machine.raise_emergency();
        for tick in 0..7 {
            machine.show_overlay(tick % 2 == 0);
        }
        assert!(machine.actuator().last().unwrap()[Direction::North].yellow);

        machine.clear_emergency();
        assert_eq!(machine.state().configuration(), &before);
        assert_eq!(machine.actuator().last(), Some(before));
    }

    #[test]
    fn overlay_is_inert_outside_emergency() {
        let mut machine = machine();
        let shown = machine.actuator().shown.len();
        machine.show_overlay(true);
        assert_eq!(machine.actuator().shown.len(), shown);
    }

    #[test]
    fn all_stop_is_idempotent() {
        let mut machine = machine();
        machine.apply_phase("GGGrrrrrrrrr", Some(30));
        machine.force_all_stop();
        let once = machine.state().clone();
        machine.force_all_stop();
        assert_eq!(machine.state(), &once);
        assert_eq!(machine.actuator().last(), Some(PhaseConfiguration::ALL_RED));
    }

    #[test]
    fn flash_burst_ends_on_stored_phase() {
        let mut machine = machine();
        machine.apply_phase("GGGrrrrrrrrr", None);
        let mut delay = CountingDelay::default();
        let before = machine.actuator().shown.len();

        embassy_futures::block_on(machine.flash_yellow(&mut delay, 3, Duration::from_millis(250)));

        let shown = &machine.actuator().shown[before..];
        assert_eq!(shown.len(), 7);
        assert!(shown[0][Direction::East].yellow);
        assert!(!shown[1][Direction::East].yellow);
        assert_eq!(shown[6], north_green());
        assert_eq!(delay.elapsed_ms(), 1500);
    }

    #[test]
    fn sweep_lights_red_yellow_green() {
        let mut machine = machine();
        machine.apply_phase("rrrGGGrrrrrr", None);
        let mut delay = CountingDelay::default();
        let before = machine.actuator().shown.len();

        embassy_futures::block_on(machine.lamp_sweep(&mut delay, Duration::from_millis(300)));

        let shown = &machine.actuator().shown[before..];
        let uniform = |lamp| PhaseConfiguration::uniform(DirectionLights::single(lamp));
        assert_eq!(
            shown,
            [
                uniform(LampState::Red),
                uniform(LampState::Yellow),
                uniform(LampState::Green),
                *machine.state().configuration(),
            ]
        );
        assert_eq!(delay.elapsed_ms(), 900);
    }

    #[test]
    fn snapshot_reports_uptime_and_canonical_token() {
        let mut machine = SignalMachine::new(Recorder::default(), Instant::from_secs(10));
        machine.apply_phase("GxxrrrRRRrrr", Some(12));

        let report = machine.snapshot(Instant::from_secs(75));
        assert_eq!(report.token, "GxxrrrRRRrrr");
        assert_eq!(report.canonical, "GGGrrrooorrr");
        assert_eq!(report.duration_secs, 12);
        assert_eq!(report.uptime, Duration::from_secs(65));
    }
}
