//! Listening progress and generation-time estimates.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Percentage of the work reached by `current`, rounded to the nearest unit.
///
/// Unknown or zero totals report 0.
pub fn progress_percent(current: Option<usize>, total: Option<usize>) -> u8 {
    let (Some(current), Some(total)) = (current, total) else {
        return 0;
    };
    if total == 0 {
        return 0;
    }
    let percent = (current as f64 / total as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

const ETA_WINDOW: usize = 50;

/// Rolling estimate of how long the remaining generation jobs will take.
#[derive(Debug, Clone)]
pub struct GenerationEta {
    samples: VecDeque<(usize, Instant)>,
    capacity: usize,
}

impl Default for GenerationEta {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationEta {
    pub fn new() -> Self {
        Self::with_window(ETA_WINDOW)
    }

    pub fn with_window(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(2),
        }
    }

    /// Records the remaining-job count seen at `at` and returns the estimate.
    ///
    /// Needs three samples and at least one interval in which jobs finished.
    pub fn observe(&mut self, remaining: usize, at: Instant) -> Option<Duration> {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((remaining, at));
        self.estimate()
    }

    pub fn estimate(&self) -> Option<Duration> {
        if self.samples.len() < 3 {
            return None;
        }
        let (remaining, _) = *self.samples.back()?;

        let rates: Vec<f64> = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .filter_map(|((before, then), (after, now))| {
                let processed = before.checked_sub(*after).filter(|done| *done > 0)?;
                let elapsed = now.saturating_duration_since(*then).as_secs_f64();
                Some(elapsed / processed as f64)
            })
            .collect();
        if rates.is_empty() {
            return None;
        }
        let per_job = rates.iter().sum::<f64>() / rates.len() as f64;
        Some(Duration::from_secs_f64(per_job * remaining as f64))
    }
}
