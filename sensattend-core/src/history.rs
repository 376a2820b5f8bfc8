//! Result history: past submission outcomes ordered newest-first.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt::Display;

use crate::error::{AttendanceError, Result};
use crate::label::format_label;
use crate::model::RollNumber;
use crate::wire::{HistoryRecord, Reply, ResultsBody};

#[cfg(feature = "network")]
use std::sync::Arc;
#[cfg(feature = "network")]
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "network")]
use crate::service::MatchingService;

/// Offset-less layouts, read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a service timestamp.
///
/// Accepts RFC 3339 with any offset, `YYYY-MM-DDTHH:MM` with a `Z` or
/// `+HH:MM` suffix, and the offset-less layouts in [`NAIVE_FORMATS`].
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = s
        .strip_suffix('Z')
        .or_else(|| s.strip_suffix('z'))
        .unwrap_or(s);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AttendanceError::InvalidTimestamp(raw.to_string()))
}

/// A durable record of one past submission outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub matched_roll_numbers: Vec<RollNumber>,
}

impl TryFrom<HistoryRecord> for HistoryEntry {
    type Error = AttendanceError;

    fn try_from(record: HistoryRecord) -> Result<Self> {
        Ok(Self {
            timestamp: parse_timestamp(&record.time_stamp)?,
            matched_roll_numbers: record.matched_roll_numbers,
        })
    }
}

/// One rendered history entry: its label and its (possibly empty) matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledGroup<'a> {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub matched_roll_numbers: &'a [RollNumber],
}

/// History entries sorted by timestamp, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultHistory {
    entries: Vec<HistoryEntry>,
}

impl ResultHistory {
    /// Build the ordered history from the service's records.
    ///
    /// The sort is stable: entries with identical timestamps keep the order in
    /// which the service sent them. A single unparseable timestamp rejects
    /// the whole batch.
    pub fn from_records(records: Vec<HistoryRecord>) -> Result<Self> {
        let mut entries = records
            .into_iter()
            .map(HistoryEntry::try_from)
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(Self { entries })
    }

    /// Decode a raw `/results` answer.
    pub fn from_body(status: u16, body: &[u8]) -> Result<Self> {
        let body: ResultsBody = Reply::decode(status, body)?.into_result()?;
        Self::from_records(body.data)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labeled groups rendered in UTC.
    pub fn groups(&self) -> impl Iterator<Item = LabeledGroup<'_>> {
        self.groups_in(&Utc)
    }

    /// Labeled groups with labels rendered in `tz`.
    pub fn groups_in<'a, Tz>(&'a self, tz: &'a Tz) -> impl Iterator<Item = LabeledGroup<'a>> + 'a
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.entries.iter().map(move |entry| LabeledGroup {
            label: format_label(&entry.timestamp.with_timezone(tz)),
            timestamp: entry.timestamp,
            matched_roll_numbers: &entry.matched_roll_numbers,
        })
    }
}

/// Fetches and holds the result history.
#[cfg(feature = "network")]
pub struct HistoryAggregator {
    service: Arc<dyn MatchingService>,
    history: ResultHistory,
}

#[cfg(feature = "network")]
impl HistoryAggregator {
    pub fn new(service: Arc<dyn MatchingService>) -> Self {
        Self {
            service,
            history: ResultHistory::default(),
        }
    }

    /// Fetch every record and replace the held history with the ordered set.
    ///
    /// On failure the previously held history is kept as is.
    #[instrument(level = "debug", skip(self), fields(held = self.history.len()))]
    pub async fn fetch_history(&mut self) -> Result<&ResultHistory> {
        let records = match self.service.fetch_results().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to fetch result history");
                return Err(e);
            }
        };
        debug!(records = records.len(), "Fetched result records");

        let history = ResultHistory::from_records(records).map_err(|e| {
            warn!(error = %e, "Rejected result history");
            e
        })?;

        info!(entries = history.len(), "Result history rebuilt");
        self.history = history;
        Ok(&self.history)
    }

    /// Re-fetch the history, discarding what was held.
    pub async fn refresh(&mut self) -> Result<&ResultHistory> {
        self.fetch_history().await
    }

    pub fn history(&self) -> &ResultHistory {
        &self.history
    }
}
