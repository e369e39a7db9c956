//! Phase token codec.
//!
//! A token is four groups of three characters, in North, East, West, South
//! order. Within a group offset 0 lights green when it is `G`, offset 1 lights
//! yellow when it is `Y` and offset 2 lights red when it is a lowercase `r`.
//! Anything else in a slot leaves that lamp off, so decoding never rejects a
//! character, only a wrong length.

use crate::{DecodeError, Direction, DirectionLights, LampState, PhaseConfiguration};

/// Characters in a phase token.
pub const TOKEN_LEN: usize = 12;
/// Upper bound of the UTF-8 encoding of a valid token.
pub const MAX_TOKEN_BYTES: usize = TOKEN_LEN * 4;
/// The all-stop token.
pub const ALL_RED_TOKEN: &str = "rrrrrrrrrrrr";

const GROUP_LEN: usize = 3;
const OFF_SYMBOL: char = LampState::Off as u8 as char;

pub type PhaseToken = heapless::String<MAX_TOKEN_BYTES>;

/// The characters of `token`, if it is exactly one token long.
pub fn token_chars(token: &str) -> Option<[char; TOKEN_LEN]> {
    let mut chars = ['\0'; TOKEN_LEN];
    let mut len = 0;
    for c in token.chars() {
        if len == TOKEN_LEN {
            return None;
        }
        chars[len] = c;
        len += 1;
    }

    (len == TOKEN_LEN).then_some(chars)
}

pub fn decode(token: &str) -> Result<PhaseConfiguration, DecodeError> {
    let chars = token_chars(token).ok_or(DecodeError::InvalidLength)?;

    let mut config = PhaseConfiguration::uniform(DirectionLights::OFF);
    for (direction, group) in Direction::ALL.into_iter().zip(chars.chunks_exact(GROUP_LEN)) {
        config[direction] = DirectionLights {
            green: group[0] == LampState::Green.symbol(),
            yellow: group[1] == LampState::Yellow.symbol(),
            red: group[2] == LampState::Red.symbol(),
        };
    }

    Ok(config)
}

/// Canonical token for `config`.
///
/// A direction with a single lit lamp repeats that lamp's symbol (`GGG`,
/// `YYY`, `rrr`). Other combinations put each lit lamp's symbol in its own
/// slot and `o` in the unlit ones.
pub fn encode(config: &PhaseConfiguration) -> PhaseToken {
    let mut token = PhaseToken::new();
    for (_, lights) in config.iter() {
        for c in encode_group(&lights) {
            // A canonical token is ASCII and always fits.
            let _ = token.push(c);
        }
    }

    token
}

fn encode_group(lights: &DirectionLights) -> [char; GROUP_LEN] {
    match lights.sole() {
        Some(lamp) if lamp != LampState::Off => [lamp.symbol(); GROUP_LEN],
        _ => {
            let slot = |lit: bool, lamp: LampState| if lit { lamp.symbol() } else { OFF_SYMBOL };
            [
                slot(lights.green, LampState::Green),
                slot(lights.yellow, LampState::Yellow),
                slot(lights.red, LampState::Red),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_except(direction: Direction, lights: DirectionLights) -> PhaseConfiguration {
        let mut config = PhaseConfiguration::ALL_RED;
        config[direction] = lights;
        config
    }

    #[test]
    fn north_green() {
        let config = decode("GGGrrrrrrrrr").unwrap();
        assert_eq!(
            config,
            red_except(Direction::North, DirectionLights::single(LampState::Green))
        );
    }

    #[test]
    fn east_green() {
        let config = decode("rrrGGGrrrrrr").unwrap();
        assert_eq!(
            config,
            red_except(Direction::East, DirectionLights::single(LampState::Green))
        );
    }

    #[test]
    fn slots_compare_against_their_own_literal() {
        // Uppercase R is not red, lowercase y is not yellow.
        let config = decode("RRRyyyGYrooo").unwrap();
        assert_eq!(config[Direction::North], DirectionLights::OFF);
        assert_eq!(config[Direction::East], DirectionLights::OFF);
        assert_eq!(
            config[Direction::West],
            DirectionLights {
                green: true,
                yellow: true,
                red: true,
            }
        );
        assert_eq!(config[Direction::South], DirectionLights::OFF);
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        for token in ["", "rrrrrrrrrrr", "rrrrrrrrrrrrr", "GGGrrrrrrrrrGGGrrr"] {
            assert_eq!(decode(token), Err(DecodeError::InvalidLength), "{token:?}");
        }
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // Twelve characters, more than twelve bytes.
        let config = decode("GGGéééééérrr").unwrap();
        assert!(config[Direction::North].green);
        assert_eq!(config[Direction::East], DirectionLights::OFF);
        assert_eq!(config[Direction::South], DirectionLights::RED);

        assert_eq!(decode("GGGéééééérr"), Err(DecodeError::InvalidLength));
    }

    #[test]
    fn decoding_is_deterministic() {
        for token in ["GGGrrrrrrrrr", "oYoGoryyyRRR", "xxxxxxxxxxxx"] {
            assert_eq!(decode(token), decode(token));
        }
    }

    #[test]
    fn encode_uses_canonical_groups() {
        assert_eq!(encode(&PhaseConfiguration::ALL_RED), ALL_RED_TOKEN);
        assert_eq!(encode(&decode("rrrrrrGGGrrr").unwrap()), "rrrrrrGGGrrr");

        let mut config = PhaseConfiguration::uniform(DirectionLights::OFF);
        config[Direction::East] = DirectionLights::single(LampState::Yellow);
        config[Direction::West] = DirectionLights {
            green: true,
            yellow: false,
            red: true,
        };
        assert_eq!(encode(&config), "oooYYYGorooo");
    }

    #[test]
    fn encode_normalises_rather_than_echoes() {
        let token = "GxxrrrRRRrrr";
        let canonical = encode(&decode(token).unwrap());
        assert_ne!(canonical, token);
        assert_eq!(canonical, "GGGrrrooorrr");
        assert_eq!(decode(&canonical), decode(token));
    }
}
