use std::time::Instant;

use tdigest::TDigest;

/// Measures individual prediction durations and summarizes them as
/// percentiles over the whole evaluation run.
pub struct Stopwatch {
    start_time: Instant,
    prediction_durations: Vec<f64>,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    pub fn new() -> Stopwatch {
        Stopwatch {
            start_time: Instant::now(),
            prediction_durations: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        self.start_time = Instant::now();
    }

    pub fn stop(&mut self) {
        let duration = self.start_time.elapsed();
        self.prediction_durations.push(duration.as_micros() as f64);
    }

    pub fn get_n(&self) -> usize {
        self.prediction_durations.len()
    }

    /// `percentile` is expressed out of 100, e.g. 99.5.
    pub fn get_percentile_in_micros(&self, percentile: f64) -> f64 {
        let t_digest = TDigest::new_with_size(100);
        let sorted_digest = t_digest.merge_unsorted(self.prediction_durations.clone());
        sorted_digest.estimate_quantile(percentile / 100.0)
    }
}
