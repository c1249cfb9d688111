use std::collections::BinaryHeap;

use hashbrown::HashMap;

use crate::io::{ItemId, MaskedRatings, Rating, UserId, UserRatings};
use crate::itemknn::graph::{build_graph, BuildError, BuildParams, ScoreMap};
use crate::itemknn::ItemScore;

/// A fitted item-based collaborative-filtering model. Holds the similarity
/// data computed at fit time, which is read-only for all predict and
/// recommend calls. Training ratings are supplied by the caller at prediction
/// time and never mutated.
pub struct ItemKnn {
    item_comparisons: ScoreMap,
    similar_items: ScoreMap,
}

impl ItemKnn {
    pub fn fit(
        item_index: &HashMap<ItemId, Vec<UserId>>,
        user_ratings: &UserRatings,
        user_means: Option<&HashMap<UserId, f64>>,
        params: &BuildParams,
    ) -> Result<Self, BuildError> {
        let (item_comparisons, similar_items) =
            build_graph(item_index, user_ratings, user_means, params)?;
        Ok(ItemKnn {
            item_comparisons,
            similar_items,
        })
    }

    /// Rebuilds a model from a previously exported similar-items graph,
    /// skipping the similarity computation. The full comparison table is not
    /// part of the export and stays empty on this path.
    pub fn from_graph(similar_items: ScoreMap) -> Self {
        ItemKnn {
            item_comparisons: ScoreMap::new(),
            similar_items,
        }
    }

    pub fn item_comparisons(&self) -> &ScoreMap {
        &self.item_comparisons
    }

    pub fn similar_items(&self) -> &ScoreMap {
        &self.similar_items
    }

    pub fn into_similar_items(self) -> ScoreMap {
        self.similar_items
    }

    /// Predicts a rating for `target_item` as the similarity-weighted average
    /// of the user's known ratings over the target's similar items. `None`
    /// means there is no basis for a prediction, either because the item has
    /// no similar items or because the user rated none of them.
    pub fn predict_one(
        &self,
        user_ratings: &HashMap<ItemId, Rating>,
        target_item: &str,
    ) -> Option<Rating> {
        let neighbors = self.similar_items.get(target_item)?;
        self.weighted_average(neighbors, |item_id| user_ratings.get(item_id).copied())
    }

    /// Batch prediction: every requested `(user, item)` entry is predicted
    /// from that user's training ratings.
    pub fn predict(
        &self,
        users_with_unknowns: &MaskedRatings,
        training_ratings: &UserRatings,
    ) -> MaskedRatings {
        users_with_unknowns
            .iter()
            .map(|(user_id, unknown_items)| {
                let known_ratings = training_ratings.get(user_id);
                let predictions = unknown_items
                    .keys()
                    .map(|item_id| {
                        let prediction = known_ratings
                            .and_then(|ratings| self.predict_one(ratings, item_id));
                        (item_id.clone(), prediction)
                    })
                    .collect();
                (*user_id, predictions)
            })
            .collect()
    }

    /// Prediction over k-fold test users, where each user's map mixes
    /// held-out `None` entries with visible ratings. Only the non-`None`
    /// siblings within the same map feed the weighted average.
    pub fn k_fold_predict(&self, combined_ratings: &MaskedRatings) -> MaskedRatings {
        combined_ratings
            .iter()
            .map(|(user_id, items)| {
                let predictions = items
                    .iter()
                    .filter(|(_item_id, rating)| rating.is_none())
                    .map(|(item_id, _rating)| {
                        let prediction = self.similar_items.get(item_id).and_then(|neighbors| {
                            self.weighted_average(neighbors, |sibling| {
                                items.get(sibling).copied().flatten()
                            })
                        });
                        (item_id.clone(), prediction)
                    })
                    .collect();
                (*user_id, predictions)
            })
            .collect()
    }

    fn weighted_average<F>(&self, neighbors: &HashMap<ItemId, f64>, lookup: F) -> Option<Rating>
    where
        F: Fn(&ItemId) -> Option<Rating>,
    {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (item_id, score) in neighbors.iter() {
            if let Some(rating) = lookup(item_id) {
                weighted_sum += score * rating;
                weight_total += score;
            }
        }
        if weight_total == 0.0 {
            None
        } else {
            Some(weighted_sum / weight_total)
        }
    }

    /// Recommends up to `n` unrated items. Candidates are items similar to
    /// anything the user rated at or above their own mean rating, scored by
    /// accumulated similarity weighted with the seeding rating. Ties resolve
    /// by ascending item id.
    pub fn top_n(&self, user_ratings: &HashMap<ItemId, Rating>, n: usize) -> Vec<ItemId> {
        if user_ratings.is_empty() || n == 0 {
            return Vec::new();
        }
        let mean_rating =
            user_ratings.values().sum::<f64>() / user_ratings.len() as f64;

        let mut candidate_scores: HashMap<&ItemId, f64> = HashMap::new();
        for (item_id, rating) in user_ratings.iter() {
            if *rating < mean_rating {
                continue;
            }
            if let Some(neighbors) = self.similar_items.get(item_id) {
                for (candidate, score) in neighbors.iter() {
                    if user_ratings.contains_key(candidate) {
                        continue;
                    }
                    *candidate_scores.entry(candidate).or_insert(0.0) += score * rating;
                }
            }
        }

        let mut scored_candidates: Vec<ItemScore> = candidate_scores
            .into_iter()
            .map(|(item_id, score)| ItemScore::new(item_id.clone(), score))
            .collect();
        // feed the bounded heap in item-id order so equal scores at the
        // boundary resolve deterministically
        scored_candidates.sort_unstable_by(|left, right| left.id.cmp(&right.id));

        let mut top_items: BinaryHeap<ItemScore> = BinaryHeap::with_capacity(n);
        for scored_item in scored_candidates.into_iter() {
            if top_items.len() < n {
                top_items.push(scored_item);
            } else {
                let mut bottom = top_items.peek_mut().unwrap();
                if scored_item < *bottom {
                    // ordering is reverse, a smaller item outranks the peek
                    *bottom = scored_item;
                }
            }
        }

        top_items
            .into_sorted_vec()
            .into_iter()
            .map(|scored| scored.id)
            .collect()
    }
}
