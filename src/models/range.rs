//! Compacted runs of confirmed-absent indices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A closed interval `[start_index, end_index]` of absent positions in a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundRange {
    pub id: String,
    pub year: i32,
    pub start_index: i64,
    pub end_index: i64,
    pub count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotFoundRange {
    pub fn contains(&self, index: i64) -> bool {
        index >= self.start_index && index <= self.end_index
    }

    /// True if `[start, end]` overlaps this range or sits right next to it.
    pub fn touches(&self, start: i64, end: i64) -> bool {
        start <= self.end_index + 1 && end + 1 >= self.start_index
    }
}
