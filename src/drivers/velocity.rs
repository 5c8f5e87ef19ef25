use std::collections::VecDeque;

use crate::types::Sample;

/// Number of instantaneous velocities averaged together.
pub const VELOCITY_HISTORY_SIZE: usize = 5;

/// Moving-average derivative of position, one instance per connection.
#[derive(Debug)]
pub struct VelocityEstimator {
    previous: Option<(i64, f64)>, // (timestamp ms, position mm)
    history: VecDeque<f64>,
    capacity: usize,
}

impl Default for VelocityEstimator {
    fn default() -> Self {
        Self::with_history(VELOCITY_HISTORY_SIZE)
    }
}

impl VelocityEstimator {
    pub fn with_history(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            previous: None,
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Fills `sample.velocity_mm_s` when a strictly newer predecessor exists.
    pub fn estimate(&mut self, sample: &mut Sample) {
        if let Some((prev_ts, prev_pos)) = self.previous {
            if sample.timestamp_ms > prev_ts {
                let dt_seconds = (sample.timestamp_ms - prev_ts) as f64 / 1000.0;
                let instant = (sample.position_mm - prev_pos) / dt_seconds;
                if self.history.len() == self.capacity {
                    self.history.pop_front();
                }
                self.history.push_back(instant);
                sample.velocity_mm_s = self.history.iter().sum::<f64>() / self.history.len() as f64;
            }
        }
        self.previous = Some((sample.timestamp_ms, sample.position_mm));
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.history.clear();
    }
}
