use core::fmt;
use core::ops::{Index, IndexMut};

/// A single lamp of a signal head.
///
/// The discriminant is the character that lights this lamp in its slot of a
/// phase token.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LampState {
    Off = b'o',
    Green = b'G',
    Yellow = b'Y',
    Red = b'r',
}

impl LampState {
    pub fn rotate(&mut self) {
        *self = match self {
            Self::Red => Self::Yellow,
            Self::Yellow => Self::Green,
            Self::Green => Self::Off,
            Self::Off => Self::Red,
        };
    }

    pub fn symbol(&self) -> char {
        *self as u8 as char
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Red => "RED",
        }
    }

    /// Parses a lamp name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Off, Self::Green, Self::Yellow, Self::Red]
            .into_iter()
            .find(|lamp| lamp.name().eq_ignore_ascii_case(name))
    }
}

impl Default for LampState {
    fn default() -> Self {
        Self::Off
    }
}

impl fmt::Display for LampState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the four approaches, in token order.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North = 0,
    East = 1,
    West = 2,
    South = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::North, Self::East, Self::West, Self::South];

    pub fn name(&self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::West => "west",
            Self::South => "south",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|direction| direction.name().eq_ignore_ascii_case(name))
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The three lamp channels of one direction.
///
/// Each channel is tracked on its own: all-off and multi-on combinations are
/// representable because the wire format can express them.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionLights {
    pub green: bool,
    pub yellow: bool,
    pub red: bool,
}

impl DirectionLights {
    pub const OFF: Self = Self {
        green: false,
        yellow: false,
        red: false,
    };
    pub const RED: Self = Self::single(LampState::Red);

    /// Only `lamp` lit; `LampState::Off` gives all lamps off.
    pub const fn single(lamp: LampState) -> Self {
        Self {
            green: matches!(lamp, LampState::Green),
            yellow: matches!(lamp, LampState::Yellow),
            red: matches!(lamp, LampState::Red),
        }
    }

    pub fn is_lit(&self, lamp: LampState) -> bool {
        match lamp {
            LampState::Green => self.green,
            LampState::Yellow => self.yellow,
            LampState::Red => self.red,
            LampState::Off => !(self.green || self.yellow || self.red),
        }
    }

    /// Lit lamps in green, yellow, red order.
    pub fn lit(&self) -> impl Iterator<Item = LampState> + '_ {
        [LampState::Green, LampState::Yellow, LampState::Red]
            .into_iter()
            .filter(move |lamp| self.is_lit(*lamp))
    }

    /// The lamp shown when exactly one is lit.
    pub fn sole(&self) -> Option<LampState> {
        let mut lit = self.lit();
        match (lit.next(), lit.next()) {
            (Some(lamp), None) => Some(lamp),
            (None, _) => Some(LampState::Off),
            _ => None,
        }
    }
}

/// Human readable lamp summary, e.g. `GREEN`, `GREEN+RED` or `OFF`.
impl fmt::Display for DirectionLights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut any = false;
        for lamp in self.lit() {
            if any {
                f.write_str("+")?;
            }
            f.write_str(lamp.name())?;
            any = true;
        }
        if !any {
            f.write_str(LampState::Off.name())?;
        }
        Ok(())
    }
}

/// Lamp state of the whole intersection, one entry per direction.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseConfiguration {
    lights: [DirectionLights; 4],
}

impl PhaseConfiguration {
    pub const ALL_RED: Self = Self::uniform(DirectionLights::RED);

    pub const fn uniform(lights: DirectionLights) -> Self {
        Self {
            lights: [lights; 4],
        }
    }

    pub const fn from_lights(lights: [DirectionLights; 4]) -> Self {
        Self { lights }
    }

    /// The same configuration with every yellow lamp forced to `lit`.
    pub fn with_yellow(&self, lit: bool) -> Self {
        let mut overlay = *self;
        for lights in overlay.lights.iter_mut() {
            lights.yellow = lit;
        }
        overlay
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, DirectionLights)> + '_ {
        Direction::ALL.into_iter().zip(self.lights.iter().copied())
    }
}

impl Default for PhaseConfiguration {
    fn default() -> Self {
        Self::ALL_RED
    }
}

impl Index<Direction> for PhaseConfiguration {
    type Output = DirectionLights;

    fn index(&self, direction: Direction) -> &Self::Output {
        &self.lights[direction.index()]
    }
}

impl IndexMut<Direction> for PhaseConfiguration {
    fn index_mut(&mut self, direction: Direction) -> &mut Self::Output {
        &mut self.lights[direction.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_walks_red_yellow_green_off() {
        let mut lamp = LampState::Red;
        let mut seen = [LampState::Off; 4];
        for slot in seen.iter_mut() {
            *slot = lamp;
            lamp.rotate();
        }
        assert_eq!(
            seen,
            [
                LampState::Red,
                LampState::Yellow,
                LampState::Green,
                LampState::Off
            ]
        );
        assert_eq!(lamp, LampState::Red);
    }

    #[test]
    fn summary_joins_lit_lamps() {
        assert_eq!(DirectionLights::RED.to_string(), "RED");
        assert_eq!(DirectionLights::OFF.to_string(), "OFF");
        let lights = DirectionLights {
            green: true,
            yellow: false,
            red: true,
        };
        assert_eq!(lights.to_string(), "GREEN+RED");
        assert_eq!(lights.sole(), None);
        assert_eq!(DirectionLights::OFF.sole(), Some(LampState::Off));
    }

    #[test]
    fn yellow_overlay_leaves_other_lamps() {
        let mut config = PhaseConfiguration::ALL_RED;
        config[Direction::East] = DirectionLights::single(LampState::Green);

        let overlay = config.with_yellow(true);
        for (direction, lights) in overlay.iter() {
            assert!(lights.yellow);
            assert_eq!(lights.green, config[direction].green);
            assert_eq!(lights.red, config[direction].red);
        }
        assert_eq!(overlay.with_yellow(false), config);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(Direction::from_name("WEST"), Some(Direction::West));
        assert_eq!(Direction::from_name("up"), None);
        assert_eq!(LampState::from_name("Yellow"), Some(LampState::Yellow));
        assert_eq!(LampState::from_name("off"), Some(LampState::Off));
    }
}
