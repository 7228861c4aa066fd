//! Latest perception values, written by the perception pipelines and read by
//! the orchestration loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualSignals {
    /// Detector labels, e.g. `"laptop 87%"`.
    pub objects: Vec<String>,
    /// Label of the object currently held, empty when nothing is held.
    pub holding: String,
    /// Scene caption. Empty until the captioner has produced its first result.
    pub caption: String,
    /// Answer to "what are the hands doing?".
    pub hand_caption: String,
    /// Last time a hand was in frame. Independent from `hand_caption`.
    pub last_hand_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSignals {
    /// Ambient level in dB-like units, see [`crate::volume::VolumeMeter`].
    pub volume: f64,
    /// Audio class labels, highest score first.
    pub classifications: Vec<String>,
}

/// Which video feed the signals are coming from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VideoSource {
    #[default]
    None,
    Webcam {
        #[serde(default)]
        camera_id: Option<String>,
    },
    File {
        id: String,
        #[serde(default)]
        position_secs: f64,
    },
}

/// One consistent read of every signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub visual: VisualSignals,
    pub audio: AudioSignals,
    pub video: VideoSource,
}

/// Read side of the perception pipelines.
pub trait SignalSource: Send + Sync {
    /// All signal values as of a single instant.
    fn current(&self) -> SignalReading;

    /// True once the scene captioner has produced something.
    fn scene_ready(&self) -> bool {
        !self.current().visual.caption.is_empty()
    }
}

/// Cloneable handle over the live signal state. Every write and every
/// [`SignalSource::current`] call takes the same lock, so a reading never
/// mixes values from before and after an update.
#[derive(Debug, Clone, Default)]
pub struct SharedSignals {
    inner: Arc<RwLock<SignalReading>>,
}

impl SharedSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_visual(&self, f: impl FnOnce(&mut VisualSignals)) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state.visual);
    }

    pub fn update_audio(&self, f: impl FnOnce(&mut AudioSignals)) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state.audio);
    }

    pub fn set_video(&self, video: VideoSource) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.video = video;
    }

    pub fn mark_hand_seen(&self, at: DateTime<Utc>) {
        self.update_visual(|v| v.last_hand_seen = Some(at));
    }
}

impl SignalSource for SharedSignals {
    fn current(&self) -> SignalReading {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn scene_ready(&self) -> bool {
        !self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .visual
            .caption
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_until_first_caption() {
        let signals = SharedSignals::new();
        assert!(!signals.scene_ready());

        signals.update_visual(|v| v.caption = "a person at a desk".to_string());
        assert!(signals.scene_ready());
    }

    #[test]
    fn clones_share_state() {
        let writer = SharedSignals::new();
        let reader = writer.clone();

        writer.update_audio(|a| {
            a.volume = 42.0;
            a.classifications = vec!["Speech".into(), "Typing".into()];
        });
        writer.set_video(VideoSource::Webcam { camera_id: None });

        let reading = reader.current();
        assert_eq!(reading.audio.volume, 42.0);
        assert_eq!(reading.audio.classifications.len(), 2);
        assert_eq!(reading.video, VideoSource::Webcam { camera_id: None });
    }

    #[test]
    fn video_source_wire_format() {
        let file: VideoSource =
            serde_json::from_str(r#"{"kind":"file","id":"kitchen.mp4","position_secs":12.5}"#).unwrap();
        assert_eq!(
            file,
            VideoSource::File {
                id: "kitchen.mp4".into(),
                position_secs: 12.5
            }
        );

        let cam: VideoSource = serde_json::from_str(r#"{"kind":"webcam"}"#).unwrap();
        assert_eq!(cam, VideoSource::Webcam { camera_id: None });
    }
}
