use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Longest duration chrono can represent, in whole seconds.
const MAX_REPRESENTABLE_SECS: u64 = (i64::MAX / 1_000) as u64;

/// Phases of a ledger's voting lifecycle. The only transition is
/// `Open` -> `Closed`, driven by elapsed time alone.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Votes are accepted.
    Open,
    /// Votes are rejected; tallies are final.
    Closed,
}

/// The interval during which votes are accepted. Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionWindow {
    start_time: DateTime<Utc>,
    duration_seconds: u64,
}

impl ElectionWindow {
    pub fn new(start_time: DateTime<Utc>, duration_seconds: u64) -> Self {
        Self {
            start_time,
            duration_seconds,
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// The first instant at which voting is closed. Durations too large to
    /// represent saturate to the end of time.
    pub fn end_time(&self) -> DateTime<Utc> {
        if self.duration_seconds > MAX_REPRESENTABLE_SECS {
            return DateTime::<Utc>::MAX_UTC;
        }
        // Fits in an i64 thanks to the bound above.
        let duration = Duration::seconds(self.duration_seconds as i64);
        self.start_time
            .checked_add_signed(duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.end_time()
    }

    pub fn phase(&self, now: DateTime<Utc>) -> Phase {
        if self.is_open(now) {
            Phase::Open
        } else {
            Phase::Closed
        }
    }

    /// Whole seconds of voting left; zero once closed.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        let remaining = self.end_time().signed_duration_since(now).num_seconds();
        u64::try_from(remaining).unwrap_or(0)
    }
}
