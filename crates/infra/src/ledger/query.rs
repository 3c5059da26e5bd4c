//! Query shapes for ledger reads.

use std::ops::Bound;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of the `(timestamp, id)` sort applied to a ledger read.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Interval of instants over which movements are selected.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub lower: Bound<DateTime<Utc>>,
    pub upper: Bound<DateTime<Utc>>,
}

impl TimeRange {
    /// `(-∞, ∞)`.
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// `(-∞, until]`.
    pub fn up_to(until: DateTime<Utc>) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Included(until),
        }
    }

    /// `(after, ∞)`.
    pub fn after(after: DateTime<Utc>) -> Self {
        Self {
            lower: Bound::Excluded(after),
            upper: Bound::Unbounded,
        }
    }

    /// `(after, until]`, or `(-∞, until]` when `after` is `None`. This is the forward
    /// replay window behind a checkpoint.
    pub fn replay_window(after: Option<DateTime<Utc>>, until: DateTime<Utc>) -> Self {
        Self {
            lower: after.map_or(Bound::Unbounded, Bound::Excluded),
            upper: Bound::Included(until),
        }
    }

    /// `[start, end]`.
    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            lower: Bound::Included(start),
            upper: Bound::Included(end),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let above = match self.lower {
            Bound::Included(l) => instant >= l,
            Bound::Excluded(l) => instant > l,
            Bound::Unbounded => true,
        };
        let below = match self.upper {
            Bound::Included(u) => instant <= u,
            Bound::Excluded(u) => instant < u,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Whether no instant can satisfy the range.
    pub fn is_empty(&self) -> bool {
        match (self.lower, self.upper) {
            (Bound::Included(l), Bound::Included(u)) => l > u,
            (Bound::Included(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u))
            | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
            _ => false,
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::all()
    }
}
