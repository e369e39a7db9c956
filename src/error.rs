use core::fmt;

/// Failure to decode a phase token.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The token is not exactly [`TOKEN_LEN`](crate::TOKEN_LEN) characters long.
    InvalidLength,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength => f.write_str("invalid-length"),
        }
    }
}

/// A reliable-channel request envelope that could not be understood.
///
/// These never reach the state machine.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    Empty,
    NotUtf8,
    UnknownCommand,
    MissingField(&'static str),
    InvalidField(&'static str),
    Oversized,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::NotUtf8 => f.write_str("not-utf8"),
            Self::UnknownCommand => f.write_str("unknown-command"),
            Self::MissingField(field) => write!(f, "missing-{}", field),
            Self::InvalidField(field) => write!(f, "invalid-{}", field),
            Self::Oversized => f.write_str("oversized"),
        }
    }
}
