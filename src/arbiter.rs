use embassy_time::Instant;

use crate::codec::{self, token_chars, PhaseToken};
use crate::history::{Counters, PhaseLog, PhaseRecord, Source};
use crate::machine::{PhaseResult, SignalMachine};
use crate::protocol::{EmergencyNotice, PhaseCommand, Priority, Request, Response};
use crate::siren::AlertLevel;
use crate::{Direction, DirectionLights, LampActuator, LampState};

/// Timed work a request asks for once it has been answered.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Blink the yellow lamps a fixed number of times, then sound a long alert.
    FlashBurst,
    Alert(AlertLevel),
    LampSweep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub response: Response,
    pub effect: Option<Effect>,
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Self {
            response,
            effect: None,
        }
    }
}

/// Feeds commands from every ingress channel into the state machine.
///
/// Commands are applied as they arrive: the last one applied wins, nothing is
/// queued or merged here.
pub struct Arbiter<A> {
    machine: SignalMachine<A>,
    counters: Counters,
    log: PhaseLog,
    identification: &'static str,
}

impl<A: LampActuator> Arbiter<A> {
    pub fn new(machine: SignalMachine<A>, identification: &'static str) -> Self {
        Self {
            machine,
            counters: Counters::default(),
            log: PhaseLog::new(),
            identification,
        }
    }

    pub fn machine(&self) -> &SignalMachine<A> {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut SignalMachine<A> {
        &mut self.machine
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn log(&self) -> &PhaseLog {
        &self.log
    }

    /// Answers a request from the reliable channel.
    pub fn handle(&mut self, request: Request, now: Instant) -> Outcome {
        match request {
            Request::SubmitPhase(command) => self.submit_phase(&command, now).into(),
            Request::SetLamp { direction, lamp } => self.set_lamp(direction, lamp, now).into(),
            Request::SubmitEmergency(notice) => self.submit_emergency(&notice),
            Request::Status => Response::Status {
                report: self.machine.snapshot(now),
                counters: self.counters,
            }
            .into(),
            Request::History => Response::History(self.log.clone()).into(),
            Request::Probe => Outcome {
                response: Response::Probe {
                    identification: self.identification,
                },
                effect: Some(Effect::LampSweep),
            },
        }
    }

    /// Handles a reliable-channel line, answering malformed envelopes
    /// without touching the state machine.
    pub fn handle_bytes(&mut self, bytes: &[u8], now: Instant) -> Outcome {
        match Request::from_bytes(bytes) {
            Ok(request) => self.handle(request, now),
            Err(err) => {
                warn!("malformed request: {}", err);
                Counters::bump(&mut self.counters.malformed);
                Response::Malformed(err).into()
            }
        }
    }

    /// The command states the emergency status it wants, so an absent alert
    /// clears emergency. This holds for a rejected token too: the alert is
    /// raised on top of all stop.
    pub fn submit_phase(&mut self, command: &PhaseCommand, now: Instant) -> Response {
        let response = self.apply(&command.token, command.duration_secs, Source::Reliable, now);
        if command.alert {
            self.machine.raise_emergency();
        } else {
            self.machine.clear_emergency();
        }

        response
    }

    /// Best-effort channel. Anything that is not a whole token is noise and
    /// is dropped without touching the lamps. Returns whether it was applied.
    pub fn submit_datagram(&mut self, payload: &[u8], now: Instant) -> bool {
        let token = match core::str::from_utf8(payload) {
            Ok(token) if token_chars(token).is_some() => token,
            _ => {
                debug!("dropping {} byte datagram", payload.len());
                Counters::bump(&mut self.counters.dropped);
                return false;
            }
        };

        self.apply(token, None, Source::BestEffort, now).is_ok()
    }

    pub fn submit_emergency(&mut self, notice: &EmergencyNotice) -> Outcome {
        info!(
            "emergency notice ({}): {}",
            notice.priority,
            notice.message.as_str()
        );
        let effect = match notice.priority {
            Priority::High => {
                self.machine.raise_emergency();
                Effect::FlashBurst
            }
            Priority::Other => Effect::Alert(AlertLevel::Short),
        };

        Outcome {
            response: Response::Emergency(notice.priority),
            effect: Some(effect),
        }
    }

    /// Sets one direction to `lamp` and keeps the other three.
    ///
    /// Goes through the same path as a phase command, including the emergency
    /// status being left as it is.
    pub fn set_lamp(&mut self, direction: Direction, lamp: LampState, now: Instant) -> Response {
        let mut config = *self.machine.state().configuration();
        config[direction] = DirectionLights::single(lamp);
        let token = codec::encode(&config);
        let duration_secs = self.machine.state().duration_secs();

        self.apply(&token, Some(duration_secs), Source::Lamp, now)
    }

    fn apply(&mut self, token: &str, duration_secs: Option<u32>, source: Source, now: Instant) -> Response {
        match self.machine.apply_phase(token, duration_secs) {
            PhaseResult::Accepted => {
                Counters::bump(&mut self.counters.accepted);
                let state = self.machine.state();
                let mut accepted = PhaseToken::new();
                let _ = accepted.push_str(state.token());
                self.log.record(PhaseRecord {
                    at: self.machine.uptime(now),
                    source,
                    token: accepted.clone(),
                    duration_secs: state.duration_secs(),
                });

                Response::Accepted { token: accepted }
            }
            PhaseResult::Rejected(err) => {
                Counters::bump(&mut self.counters.rejected);
                Response::Rejected(err)
            }
        }
    }
}
