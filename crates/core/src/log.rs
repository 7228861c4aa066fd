//! Session log of published assessments and its CSV export.

use crate::assessment::SituationalAssessment;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

pub const CSV_HEADER: [&str; 18] = [
    "timestamp",
    "video_id",
    "objects",
    "hand_detected",
    "holding",
    "caption",
    "hand_caption",
    "volume",
    "audio_classification",
    "activity",
    "environment",
    "start_time",
    "delay",
    "video_time",
    "eye_status",
    "hearing_status",
    "vocal_status",
    "hand_status",
];

/// One published tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub snapshot: Snapshot,
    pub activity: String,
    pub environment: String,
    pub assessment: SituationalAssessment,
    /// Seconds from snapshot to publish, two decimals.
    pub latency_secs: f64,
}

impl LogEntry {
    fn csv_fields(&self) -> [String; 18] {
        let s = &self.snapshot;
        [
            self.timestamp.timestamp_millis().to_string(),
            s.video.id.clone(),
            s.objects.join("; "),
            s.hand_detected.to_string(),
            s.holding.clone(),
            s.caption.clone(),
            s.hand_caption.clone(),
            s.volume.to_string(),
            s.audio_classes.join("; "),
            self.activity.clone(),
            self.environment.clone(),
            s.started_at.timestamp_millis().to_string(),
            self.latency_secs.to_string(),
            s.video.time.to_string(),
            self.assessment.eye.to_string(),
            self.assessment.hearing.to_string(),
            self.assessment.vocal.to_string(),
            self.assessment.hand.to_string(),
        ]
    }
}

/// Seconds between two instants, rounded to two decimals and never negative.
pub fn latency_secs(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let ms = end.signed_duration_since(start).num_milliseconds().max(0);
    (ms as f64 / 10.0).round() / 100.0
}

/// Append-only, in-memory log shared between the loop and the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: LogEntry) {
        self.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    pub fn latest(&self) -> Option<LogEntry> {
        self.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every entry. Only called on an explicit user reset.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Renders `entries` as CSV: the fixed header, then one row per entry.
pub fn to_csv(entries: &[LogEntry]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');
    for entry in entries {
        let row = entry
            .csv_fields()
            .iter()
            .map(|f| escape_field(f))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    out
}

/// Download name for an export: the first entry's video id.
pub fn csv_filename(entries: &[LogEntry]) -> String {
    match entries.first() {
        Some(entry) if !entry.snapshot.video.id.is_empty() => {
            // Keep it a bare file name that fits in a header value.
            let id = entry
                .snapshot
                .video
                .id
                .replace(|c: char| c.is_control() || matches!(c, '/' | '\\' | '"'), "_");
            format!("{id}.csv")
        }
        _ => "session.csv".to_string(),
    }
}

// RFC 4180 quoting.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
