//! Request/response envelope of the reliable channel.
//!
//! One ASCII line per request. The keyword is case insensitive and fields are
//! separated by spaces:
//!
//! ```text
//! PHASE <token> [duration=<secs>] [alert=<true|false|1|0>]
//! LAMP <north|east|west|south> <green|yellow|red|off>
//! EMERGENCY <priority> [message...]
//! STATUS
//! HISTORY
//! PROBE
//! ```

use core::fmt;

use heapless::String;

use crate::history::{Counters, PhaseLog};
use crate::machine::StatusReport;
use crate::{DecodeError, Direction, LampState, PhaseToken, TransportError};

/// Longest reliable-channel request line, in bytes.
pub const MAX_REQUEST_LEN: usize = 128;
/// Longest emergency message kept, in bytes.
pub const MAX_MESSAGE_LEN: usize = 64;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseCommand {
    /// As received. Length is checked by the codec, not here.
    pub token: String<MAX_REQUEST_LEN>,
    pub duration_secs: Option<u32>,
    pub alert: bool,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Other,
}

impl Priority {
    /// Only the exact word `HIGH` is high priority.
    pub fn parse(word: &str) -> Self {
        if word == "HIGH" {
            Self::High
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "HIGH",
            Self::Other => "other",
        })
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyNotice {
    pub priority: Priority,
    /// Free text, cut at [`MAX_MESSAGE_LEN`] bytes.
    pub message: String<MAX_MESSAGE_LEN>,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    SubmitPhase(PhaseCommand),
    SetLamp {
        direction: Direction,
        lamp: LampState,
    },
    SubmitEmergency(EmergencyNotice),
    Status,
    History,
    Probe,
}

impl Request {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransportError> {
        if bytes.len() > MAX_REQUEST_LEN {
            return Err(TransportError::Oversized);
        }
        let line = core::str::from_utf8(bytes).map_err(|_| TransportError::NotUtf8)?;
        Self::parse(line)
    }

    pub fn parse(line: &str) -> Result<Self, TransportError> {
        let line = line.trim_matches(|c: char| c.is_ascii_whitespace());
        if line.is_empty() {
            return Err(TransportError::Empty);
        }
        if line.len() > MAX_REQUEST_LEN {
            return Err(TransportError::Oversized);
        }

        let (keyword, rest) = split_word(line);
        let is = |name: &str| keyword.eq_ignore_ascii_case(name);

        if is("PHASE") {
            parse_phase(rest).map(Self::SubmitPhase)
        } else if is("LAMP") {
            parse_lamp(rest)
        } else if is("EMERGENCY") {
            parse_emergency(rest).map(Self::SubmitEmergency)
        } else if is("STATUS") {
            no_arguments(rest, Self::Status)
        } else if is("HISTORY") {
            no_arguments(rest, Self::History)
        } else if is("PROBE") {
            no_arguments(rest, Self::Probe)
        } else {
            Err(TransportError::UnknownCommand)
        }
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start_matches(' ');
    match s.split_once(' ') {
        Some((word, rest)) => (word, rest.trim_start_matches(' ')),
        None => (s, ""),
    }
}

fn no_arguments(rest: &str, request: Request) -> Result<Request, TransportError> {
    if rest.is_empty() {
        Ok(request)
    } else {
        Err(TransportError::InvalidField("argument"))
    }
}

fn parse_phase(rest: &str) -> Result<PhaseCommand, TransportError> {
    let mut words = rest.split(' ').filter(|word| !word.is_empty());
    let token = words.next().ok_or(TransportError::MissingField("token"))?;

    let mut command = PhaseCommand {
        token: bounded(token)?,
        duration_secs: None,
        alert: false,
    };
    for word in words {
        let (key, value) = word
            .split_once('=')
            .ok_or(TransportError::InvalidField("option"))?;
        if key.eq_ignore_ascii_case("duration") {
            let secs = value
                .parse()
                .map_err(|_| TransportError::InvalidField("duration"))?;
            command.duration_secs = Some(secs);
        } else if key.eq_ignore_ascii_case("alert") {
            command.alert = parse_flag(value).ok_or(TransportError::InvalidField("alert"))?;
        } else {
            return Err(TransportError::InvalidField("option"));
        }
    }

    Ok(command)
}

fn parse_flag(value: &str) -> Option<bool> {
    if value == "1" || value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value == "0" || value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_lamp(rest: &str) -> Result<Request, TransportError> {
    let mut words = rest.split(' ').filter(|word| !word.is_empty());
    let direction = words.next().ok_or(TransportError::MissingField("direction"))?;
    let direction = Direction::from_name(direction).ok_or(TransportError::InvalidField("direction"))?;
    let lamp = words.next().ok_or(TransportError::MissingField("lamp"))?;
    let lamp = LampState::from_name(lamp).ok_or(TransportError::InvalidField("lamp"))?;
    if words.next().is_some() {
        return Err(TransportError::InvalidField("argument"));
    }

    Ok(Request::SetLamp { direction, lamp })
}

fn parse_emergency(rest: &str) -> Result<EmergencyNotice, TransportError> {
    let (priority, message) = split_word(rest);
    if priority.is_empty() {
        return Err(TransportError::MissingField("priority"));
    }

    let mut text = String::new();
    for c in message.chars() {
        if text.push(c).is_err() {
            break;
        }
    }

    Ok(EmergencyNotice {
        priority: Priority::parse(priority),
        message: text,
    })
}

fn bounded<const N: usize>(s: &str) -> Result<String<N>, TransportError> {
    let mut out = String::new();
    out.push_str(s).map_err(|_| TransportError::Oversized)?;
    Ok(out)
}

/// Answer to a reliable-channel request, rendered as one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Accepted { token: PhaseToken },
    Rejected(DecodeError),
    Malformed(TransportError),
    Emergency(Priority),
    Status {
        report: StatusReport,
        counters: Counters,
    },
    History(PhaseLog),
    Probe { identification: &'static str },
}

impl Response {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Rejected(_) | Self::Malformed(_))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { token } => write!(f, "OK phase={}", token),
            Self::Rejected(err) => write!(f, "ERR phase {}", err),
            Self::Malformed(err) => write!(f, "ERR malformed {}", err),
            Self::Emergency(priority) => write!(f, "OK emergency={}", priority),
            Self::Status { report, counters } => {
                write!(
                    f,
                    "STATUS phase={} canonical={} duration={} emergency={} uptime={}",
                    report.token,
                    report.canonical,
                    report.duration_secs,
                    u8::from(report.emergency_active),
                    report.uptime.as_secs()
                )?;
                for (direction, lights) in report.configuration.iter() {
                    write!(f, " {}={}", direction, lights)?;
                }
                write!(
                    f,
                    " accepted={} rejected={} dropped={} malformed={}",
                    counters.accepted, counters.rejected, counters.dropped, counters.malformed
                )
            }
            Self::History(log) => write!(f, "HISTORY {}", log),
            Self::Probe { identification } => write!(f, "OK probe {}", identification),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec, PhaseConfiguration};
    use embassy_time::Duration;

    fn phase(token: &str, duration_secs: Option<u32>, alert: bool) -> Request {
        Request::SubmitPhase(PhaseCommand {
            token: bounded(token).unwrap(),
            duration_secs,
            alert,
        })
    }

    #[test]
    fn parses_phase_with_options() {
        assert_eq!(
            Request::parse("PHASE GGGrrrrrrrrr duration=30 alert=true\r\n"),
            Ok(phase("GGGrrrrrrrrr", Some(30), true))
        );
        assert_eq!(
            Request::parse("phase rrrGGGrrrrrr"),
            Ok(phase("rrrGGGrrrrrr", None, false))
        );
        assert_eq!(
            Request::parse("PHASE rrrGGGrrrrrr alert=0 duration=5"),
            Ok(phase("rrrGGGrrrrrr", Some(5), false))
        );
    }

    #[test]
    fn wrong_length_token_still_parses() {
        // The decoder rejects it, so the controller can fall back to all stop.
        assert_eq!(Request::parse("PHASE GGG"), Ok(phase("GGG", None, false)));
    }

    #[test]
    fn bad_envelopes_are_reported() {
        let cases = [
            ("", TransportError::Empty),
            ("   \r\n", TransportError::Empty),
            ("JUMP", TransportError::UnknownCommand),
            ("PHASE", TransportError::MissingField("token")),
            ("PHASE GGGrrrrrrrrr duration=soon", TransportError::InvalidField("duration")),
            ("PHASE GGGrrrrrrrrr duration=-1", TransportError::InvalidField("duration")),
            ("PHASE GGGrrrrrrrrr alert=maybe", TransportError::InvalidField("alert")),
            ("PHASE GGGrrrrrrrrr colour=blue", TransportError::InvalidField("option")),
            ("PHASE GGGrrrrrrrrr 30", TransportError::InvalidField("option")),
            ("STATUS now", TransportError::InvalidField("argument")),
            ("LAMP", TransportError::MissingField("direction")),
            ("LAMP up green", TransportError::InvalidField("direction")),
            ("LAMP north", TransportError::MissingField("lamp")),
            ("LAMP north blue", TransportError::InvalidField("lamp")),
            ("EMERGENCY", TransportError::MissingField("priority")),
        ];
        for (line, err) in cases {
            assert_eq!(Request::parse(line), Err(err), "{line:?}");
        }
        assert_eq!(
            Request::from_bytes(&[b'P', 0xff, 0xfe]),
            Err(TransportError::NotUtf8)
        );
        assert_eq!(
            Request::from_bytes(&[b'x'; MAX_REQUEST_LEN + 1]),
            Err(TransportError::Oversized)
        );
    }

    #[test]
    fn parses_lamp_and_queries() {
        assert_eq!(
            Request::parse("LAMP East Yellow"),
            Ok(Request::SetLamp {
                direction: Direction::East,
                lamp: LampState::Yellow,
            })
        );
        assert_eq!(Request::parse("status"), Ok(Request::Status));
        assert_eq!(Request::parse("HISTORY"), Ok(Request::History));
        assert_eq!(Request::parse("Probe"), Ok(Request::Probe));
    }

    #[test]
    fn only_exact_high_is_high_priority() {
        let Ok(Request::SubmitEmergency(notice)) =
            Request::parse("EMERGENCY HIGH ambulance from the north")
        else {
            panic!("expected an emergency");
        };
        assert_eq!(notice.priority, Priority::High);
        assert_eq!(notice.message, "ambulance from the north");

        for line in ["EMERGENCY high", "EMERGENCY LOW", "EMERGENCY URGENT  siren"] {
            let Ok(Request::SubmitEmergency(notice)) = Request::parse(line) else {
                panic!("expected an emergency: {line:?}");
            };
            assert_eq!(notice.priority, Priority::Other);
        }
    }

    #[test]
    fn long_emergency_message_is_cut() {
        let line = format!("EMERGENCY HIGH {}", "x".repeat(100));
        let Ok(Request::SubmitEmergency(notice)) = Request::parse(&line) else {
            panic!("expected an emergency");
        };
        assert_eq!(notice.message.len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn renders_responses() {
        let token = codec::encode(&codec::decode("GGGrrrrrrrrr").unwrap());
        assert_eq!(
            Response::Accepted { token }.to_string(),
            "OK phase=GGGrrrrrrrrr"
        );
        assert_eq!(
            Response::Rejected(DecodeError::InvalidLength).to_string(),
            "ERR phase invalid-length"
        );
        assert_eq!(
            Response::Malformed(TransportError::MissingField("token")).to_string(),
            "ERR malformed missing-token"
        );
        assert_eq!(Response::Emergency(Priority::High).to_string(), "OK emergency=HIGH");
        assert!(!Response::Rejected(DecodeError::InvalidLength).is_ok());
    }

    #[test]
    fn renders_status_line() {
        let report = StatusReport {
            token: codec::encode(&PhaseConfiguration::ALL_RED),
            canonical: codec::encode(&PhaseConfiguration::ALL_RED),
            duration_secs: 0,
            emergency_active: true,
            uptime: Duration::from_secs(42),
            configuration: PhaseConfiguration::ALL_RED,
        };
        let counters = Counters {
            accepted: 3,
            rejected: 1,
            dropped: 2,
            malformed: 0,
        };
        assert_eq!(
            Response::Status { report, counters }.to_string(),
            "STATUS phase=rrrrrrrrrrrr canonical=rrrrrrrrrrrr duration=0 emergency=1 uptime=42 \
             north=RED east=RED west=RED south=RED accepted=3 rejected=1 dropped=2 malformed=0"
        );
    }
}
