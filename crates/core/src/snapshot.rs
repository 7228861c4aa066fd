use crate::signals::{SignalReading, VideoSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How recently a hand must have been seen to count as present.
pub const DEFAULT_HAND_WINDOW: Duration = Duration::from_millis(2000);
/// Number of audio class labels kept per snapshot.
pub const AUDIO_LABELS: usize = 3;

/// Identifies the frame source of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRef {
    /// `"webcam"`, the file identifier, or empty when no source is active.
    pub id: String,
    /// Start timestamp in ms for the webcam, playback position in seconds for
    /// a file, `-1` otherwise.
    pub time: f64,
}

/// Every signal value one tick works from, copied at tick start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub objects: Vec<String>,
    pub hand_detected: bool,
    pub holding: String,
    pub caption: String,
    pub hand_caption: String,
    pub volume: f64,
    pub audio_classes: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub video: VideoRef,
}

impl Snapshot {
    /// Builds a snapshot from one reading. Hand presence is derived from the
    /// last-seen timestamp relative to `now`, not from any stored flag.
    pub fn capture(reading: SignalReading, now: DateTime<Utc>, hand_window: Duration) -> Self {
        let SignalReading {
            visual,
            mut audio,
            video,
        } = reading;

        audio.classifications.truncate(AUDIO_LABELS);

        let video = match video {
            VideoSource::Webcam { .. } => VideoRef {
                id: "webcam".to_string(),
                time: now.timestamp_millis() as f64,
            },
            VideoSource::File { id, position_secs } => VideoRef {
                id,
                time: position_secs,
            },
            VideoSource::None => VideoRef {
                id: String::new(),
                time: -1.0,
            },
        };

        Self {
            objects: visual.objects,
            hand_detected: hand_recent(visual.last_hand_seen, now, hand_window),
            holding: visual.holding,
            caption: visual.caption,
            hand_caption: visual.hand_caption,
            volume: audio.volume,
            audio_classes: audio.classifications,
            started_at: now,
            video,
        }
    }
}

/// True when `last_seen` is strictly less than `window` before `now`.
pub fn hand_recent(last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    let Some(seen) = last_seen else {
        return false;
    };
    let age_ms = now.signed_duration_since(seen).num_milliseconds();
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    age_ms < window_ms
}
