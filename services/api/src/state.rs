use serde::{Deserialize, Serialize};
use situ_client::{CaptionClient, ChatClient};
use situ_core::gate::AdmissionGate;
use situ_core::{PeriodControl, SessionLog, SharedSignals, VolumeMeter};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Display-only toggles shown to the operator. They never affect inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// Blank the video preview.
    pub black_overlay: bool,
    /// Draw detector boxes over the preview.
    pub detection_overlay: bool,
}

/// Shared handles for the HTTP handlers. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub signals: SharedSignals,
    pub log: SessionLog,
    pub chat: Arc<ChatClient>,
    pub caption: Option<Arc<CaptionClient>>,
    pub period: PeriodControl,
    pub gate: Arc<AdmissionGate>,
    volume: Arc<Mutex<VolumeMeter>>,
    display: Arc<RwLock<DisplaySettings>>,
}

impl AppState {
    pub fn new(
        signals: SharedSignals,
        log: SessionLog,
        chat: Arc<ChatClient>,
        caption: Option<Arc<CaptionClient>>,
        period: PeriodControl,
        gate: Arc<AdmissionGate>,
    ) -> Self {
        Self {
            signals,
            log,
            chat,
            caption,
            period,
            gate,
            volume: Arc::new(Mutex::new(VolumeMeter::new())),
            display: Arc::new(RwLock::new(DisplaySettings::default())),
        }
    }

    /// Runs `f` against the volume meter and returns its reading.
    pub fn with_volume_meter(&self, f: impl FnOnce(&mut VolumeMeter) -> f64) -> f64 {
        let mut meter = self.volume.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut meter)
    }

    pub fn display(&self) -> DisplaySettings {
        *self.display.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update_display(&self, f: impl FnOnce(&mut DisplaySettings)) -> DisplaySettings {
        let mut display = self.display.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut display);
        *display
    }
}
