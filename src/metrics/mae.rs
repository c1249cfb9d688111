use hashbrown::HashMap;

use crate::io::{ItemId, MaskedRatings, Rating, UserId};
use crate::metrics::AccuracyMetric;

/// Mean absolute error between held-out ratings and predictions. Lower is
/// better.
pub struct Mae {
    total_error: f64,
    qty: usize,
}

impl Mae {
    pub fn new() -> Mae {
        Mae {
            total_error: 0_f64,
            qty: 0,
        }
    }
}

impl Default for Mae {
    fn default() -> Self {
        Self::new()
    }
}

impl AccuracyMetric for Mae {
    fn add(&mut self, truth: Rating, predicted: Option<Rating>) {
        if let Some(value) = predicted {
            self.qty += 1;
            self.total_error += (truth - value).abs();
        }
    }

    fn result(&self) -> Option<f64> {
        if self.qty > 0 {
            Some(self.total_error / self.qty as f64)
        } else {
            None
        }
    }

    fn get_name(&self) -> String {
        "MAE".to_string()
    }
}

/// Averages `|truth - prediction|` over every (user, item) entry that has a
/// prediction. `None` signals that no prediction was comparable, rather than
/// dividing by zero.
pub fn mean_absolute_error(
    truth: &HashMap<UserId, HashMap<ItemId, Rating>>,
    predicted: &MaskedRatings,
) -> Option<f64> {
    let mut metric = Mae::new();
    for (user_id, items) in predicted.iter() {
        if let Some(truth_items) = truth.get(user_id) {
            for (item_id, prediction) in items.iter() {
                if let Some(truth_value) = truth_items.get(item_id) {
                    metric.add(*truth_value, *prediction);
                }
            }
        }
    }
    metric.result()
}
