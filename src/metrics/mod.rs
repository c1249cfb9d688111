pub mod mae;

use crate::io::Rating;

/// Accumulator over (truth, prediction) pairs from a held-out evaluation.
/// Entries without a prediction carry no information about accuracy and are
/// excluded from the result.
pub trait AccuracyMetric {
    fn add(&mut self, truth: Rating, predicted: Option<Rating>);
    fn result(&self) -> Option<f64>;
    fn get_name(&self) -> String;
}
