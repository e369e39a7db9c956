use core::fmt;

use embassy_time::Duration;
use heapless::Deque;

use crate::PhaseToken;

/// Entries kept by [`PhaseLog`].
pub const HISTORY_DEPTH: usize = 8;

/// Where an accepted phase came from.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Reliable,
    BestEffort,
    /// A single direction set from the reliable channel.
    Lamp,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reliable => "reliable",
            Self::BestEffort => "best-effort",
            Self::Lamp => "lamp",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRecord {
    /// Controller uptime when the phase was accepted.
    pub at: Duration,
    pub source: Source,
    pub token: PhaseToken,
    pub duration_secs: u32,
}

impl fmt::Display for PhaseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}s {} {} {}",
            self.at.as_secs(),
            self.source,
            self.token,
            self.duration_secs
        )
    }
}

/// The most recent accepted phases, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PhaseLog {
    records: Deque<PhaseRecord, HISTORY_DEPTH>,
}

impl PhaseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: PhaseRecord) {
        if self.records.is_full() {
            let _ = self.records.pop_front();
        }
        let _ = self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhaseRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&PhaseRecord> {
        self.records.back()
    }
}

impl PartialEq for PhaseLog {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for PhaseLog {}

impl fmt::Display for PhaseLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={}", self.len())?;
        for (i, record) in self.iter().enumerate() {
            let sep = if i == 0 { " " } else { "; " };
            write!(f, "{}{}", sep, record)?;
        }
        Ok(())
    }
}

/// Per-outcome command counts since boot.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub accepted: u32,
    /// Tokens of the wrong length that forced all stop.
    pub rejected: u32,
    /// Best-effort payloads discarded as noise.
    pub dropped: u32,
    /// Reliable requests whose envelope could not be parsed.
    pub malformed: u32,
}

impl Counters {
    pub(crate) fn bump(counter: &mut u32) {
        *counter = counter.saturating_add(1);
    }
}
