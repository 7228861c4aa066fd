use std::collections::VecDeque;

/// Number of buffer levels averaged into one reading.
pub const VOLUME_WINDOW: usize = 20;

/// Rolling ambient volume estimate.
///
/// Each buffer contributes one level (mean absolute sample value, or an
/// already-normalized level in `0..=1`). The reading is the window average
/// mapped to `20·log10(avg) + 80`, so full scale reads 80 and quiet rooms sit
/// in the 30–50 range.
#[derive(Debug, Clone, Default)]
pub struct VolumeMeter {
    levels: VecDeque<f64>,
}

impl VolumeMeter {
    pub fn new() -> Self {
        Self {
            levels: VecDeque::with_capacity(VOLUME_WINDOW),
        }
    }

    /// Adds one raw sample buffer and returns the new reading.
    pub fn push_samples(&mut self, samples: &[f32]) -> f64 {
        if samples.is_empty() {
            return self.reading();
        }
        let level = samples.iter().map(|s| f64::from(s.abs())).sum::<f64>() / samples.len() as f64;
        self.push_level(level)
    }

    /// Adds one normalized level and returns the new reading.
    pub fn push_level(&mut self, level: f64) -> f64 {
        if self.levels.len() == VOLUME_WINDOW {
            self.levels.pop_front();
        }
        self.levels.push_back(level.max(0.0));
        self.reading()
    }

    /// Current reading; 0.0 when there is nothing to average or only silence.
    pub fn reading(&self) -> f64 {
        if self.levels.is_empty() {
            return 0.0;
        }
        let avg = self.levels.iter().sum::<f64>() / self.levels.len() as f64;
        if avg <= 0.0 {
            return 0.0;
        }
        (20.0 * avg.log10() + 80.0).max(0.0)
    }
}
