use std::collections::VecDeque;

use crate::types::Sample;

/// Capacity of the live series; older samples are evicted past this.
pub const LIVE_CAPACITY: usize = 10_000;

/// Ordered run of samples, optionally bounded (oldest-evicted).
#[derive(Clone, Debug, Default)]
pub struct SampleSeries {
    samples: VecDeque<Sample>,
    capacity: Option<usize>,
}

impl SampleSeries {
    pub fn bounded(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(LIVE_CAPACITY)),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn live() -> Self {
        Self::bounded(LIVE_CAPACITY)
    }

    /// Full snapshot with no capacity limit.
    pub fn from_samples(samples: impl IntoIterator<Item = Sample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            capacity: None,
        }
    }

    /// Appends and returns the evicted sample, if any.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        self.samples.push_back(sample);
        match self.capacity {
            Some(cap) if self.samples.len() > cap => self.samples.pop_front(),
            _ => None,
        }
    }

    /// Replaces the contents wholesale, keeping the newest samples if bounded.
    pub fn replace(&mut self, samples: impl IntoIterator<Item = Sample>) {
        self.samples.clear();
        for sample in samples {
            self.push(sample);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.front()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_series_evicts_oldest() {
        let mut series = SampleSeries::live();
        let mut evicted = Vec::new();
        for i in 1..=(LIVE_CAPACITY as i64 + 1) {
            if let Some(old) = series.push(Sample::new(i, 0.0, 0.0, 0)) {
                evicted.push(old.timestamp_ms);
            }
        }
        assert_eq!(series.len(), LIVE_CAPACITY);
        assert_eq!(evicted, vec![1]);
        assert_eq!(series.first().map(|s| s.timestamp_ms), Some(2));
        assert_eq!(
            series.last().map(|s| s.timestamp_ms),
            Some(LIVE_CAPACITY as i64 + 1)
        );
    }

    #[test]
    fn snapshot_is_unbounded() {
        let series = SampleSeries::from_samples((1..=20_000).map(|i| Sample::new(i, 0.0, 0.0, 0)));
        assert_eq!(series.len(), 20_000);
        assert_eq!(series.capacity(), None);
    }

    #[test]
    fn replace_respects_bound() {
        let mut series = SampleSeries::bounded(3);
        series.replace((1..=5).map(|i| Sample::new(i, 0.0, 0.0, 0)));
        let ts: Vec<i64> = series.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(ts, vec![3, 4, 5]);
    }
}
