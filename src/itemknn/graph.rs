use std::fs::File;
use std::io::{BufReader, BufWriter};

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use crate::io::{ItemId, UserId, UserRatings};
use crate::itemknn::similarity::{adjusted_cosine, cosine, Similarity, SimilarityError};

/// Sparse item-to-item score matrix. Stored directionally: an entry for
/// (a, b) does not imply an entry for (b, a) unless both directions clear the
/// minimum-comparison gate on their own.
pub type ScoreMap = HashMap<ItemId, HashMap<ItemId, f64>>;

#[derive(Clone, Debug)]
pub struct BuildParams {
    pub similarity: Similarity,
    /// minimum number of co-raters before a similarity score is stored
    pub min_comparisons: usize,
    /// scores at or above this value enter the similar-items graph
    pub threshold: f64,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("similarity threshold {0} is outside the valid range [-1, 1]")]
    ThresholdOutOfRange(f64),
    #[error("adjusted cosine similarity requires a mean rating for every rater")]
    MissingUserMeans,
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
}

/// Compares every item against its co-rated candidates and returns the full
/// comparison table plus the thresholded similar-items graph.
///
/// The outer loop is sharded across the rayon pool: each target item only
/// reads the shared indices and produces its own disjoint output rows, which
/// are merged afterwards.
pub fn build_graph(
    item_index: &HashMap<ItemId, Vec<UserId>>,
    user_ratings: &UserRatings,
    user_means: Option<&HashMap<UserId, f64>>,
    params: &BuildParams,
) -> Result<(ScoreMap, ScoreMap), BuildError> {
    if !(-1.0..=1.0).contains(&params.threshold) {
        return Err(BuildError::ThresholdOutOfRange(params.threshold));
    }
    if params.similarity == Similarity::AdjustedCosine && user_means.is_none() {
        return Err(BuildError::MissingUserMeans);
    }
    // a score needs at least one co-rating to divide by a norm
    let min_comparisons = params.min_comparisons.max(1);

    let rows = item_index
        .par_iter()
        .map(|(target_item, raters)| {
            let (comparisons, similar) = compare_against_corated(
                target_item,
                raters,
                user_ratings,
                user_means,
                min_comparisons,
                params,
            )?;
            Ok((target_item, comparisons, similar))
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    let mut item_comparisons = ScoreMap::new();
    let mut similar_items = ScoreMap::new();
    for (target_item, comparisons, similar) in rows.into_iter() {
        if !comparisons.is_empty() {
            item_comparisons.insert(target_item.clone(), comparisons);
        }
        if !similar.is_empty() {
            similar_items.insert(target_item.clone(), similar);
        }
    }
    Ok((item_comparisons, similar_items))
}

/// Scores one target item against every other item rated by any of its
/// raters. Vectors are aligned over the users that rated both items, in
/// ascending user-id order so results do not depend on map iteration order.
fn compare_against_corated(
    target_item: &ItemId,
    raters: &[UserId],
    user_ratings: &UserRatings,
    user_means: Option<&HashMap<UserId, f64>>,
    min_comparisons: usize,
    params: &BuildParams,
) -> Result<(HashMap<ItemId, f64>, HashMap<ItemId, f64>), BuildError> {
    let mut raters: Vec<UserId> = raters.to_vec();
    raters.sort_unstable();

    let mut candidates: HashSet<&ItemId> = HashSet::new();
    for user_id in raters.iter() {
        if let Some(ratings) = user_ratings.get(user_id) {
            for item_id in ratings.keys() {
                if item_id != target_item {
                    candidates.insert(item_id);
                }
            }
        }
    }

    let mut comparisons: HashMap<ItemId, f64> = HashMap::new();
    let mut similar: HashMap<ItemId, f64> = HashMap::new();

    for candidate in candidates.into_iter() {
        let mut vec_target: Vec<f64> = Vec::new();
        let mut vec_candidate: Vec<f64> = Vec::new();
        let mut centering: Vec<f64> = Vec::new();

        for user_id in raters.iter() {
            if let Some(ratings) = user_ratings.get(user_id) {
                // only users that rated both items contribute a position
                if let (Some(rating_target), Some(rating_candidate)) =
                    (ratings.get(target_item), ratings.get(candidate))
                {
                    vec_target.push(*rating_target);
                    vec_candidate.push(*rating_candidate);
                    if params.similarity == Similarity::AdjustedCosine {
                        let mean = user_means
                            .and_then(|means| means.get(user_id))
                            .ok_or(BuildError::MissingUserMeans)?;
                        centering.push(*mean);
                    }
                }
            }
        }

        if vec_target.len() < min_comparisons {
            continue;
        }

        let score = match params.similarity {
            Similarity::Cosine => cosine(&vec_target, &vec_candidate)?,
            Similarity::AdjustedCosine => {
                adjusted_cosine(&vec_target, &vec_candidate, &centering)?
            }
        };

        comparisons.insert(candidate.clone(), score);
        if score >= params.threshold {
            similar.insert(candidate.clone(), score);
        }
    }

    Ok((comparisons, similar))
}

/// A similar-items graph together with the parameters it was built with, the
/// artifact that gets exported for reuse without recomputation.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedGraph {
    pub similarity: Similarity,
    pub threshold: f64,
    pub min_comparisons: usize,
    pub similar_items: ScoreMap,
}

impl SavedGraph {
    /// Whether this graph was built with the given parameters. Callers reuse
    /// a cached graph only when its recorded provenance matches.
    pub fn matches_params(&self, params: &BuildParams) -> bool {
        self.similarity == params.similarity
            && self.threshold == params.threshold
            && self.min_comparisons == params.min_comparisons
    }
}

#[derive(Debug, Error)]
pub enum GraphIoError {
    #[error("unable to access similarity graph file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to encode or decode similarity graph: {0}")]
    Encoding(#[from] bincode::Error),
}

pub fn save_graph(graph: &SavedGraph, path: &str) -> Result<(), GraphIoError> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, graph)?;
    Ok(())
}

pub fn load_graph(path: &str) -> Result<SavedGraph, GraphIoError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}

#[cfg(test)]
mod graph_test {
    use float_cmp::approx_eq;

    use crate::itemknn::model::ItemKnn;
    use crate::reshape::reshape;

    use super::*;

    // three items, three users: items a and b get identical ratings, item c
    // runs against the pattern
    fn scenario_rows() -> Vec<crate::io::RatingRow> {
        vec![
            ("item-a".to_string(), 1, 5.0),
            ("item-b".to_string(), 1, 5.0),
            ("item-c".to_string(), 1, 1.0),
            ("item-a".to_string(), 2, 4.0),
            ("item-b".to_string(), 2, 4.0),
            ("item-c".to_string(), 2, 2.0),
            ("item-a".to_string(), 3, 1.0),
            ("item-b".to_string(), 3, 1.0),
            ("item-c".to_string(), 3, 5.0),
        ]
    }

    fn cosine_params() -> BuildParams {
        BuildParams {
            similarity: Similarity::Cosine,
            min_comparisons: 2,
            threshold: 0.9,
        }
    }

    #[test]
    fn should_score_the_three_item_scenario() {
        let reshaped = reshape(&scenario_rows(), false);
        let (item_comparisons, similar_items) = build_graph(
            &reshaped.item_index,
            &reshaped.user_ratings,
            None,
            &cosine_params(),
        )
        .unwrap();

        // identical rating vectors
        assert!(approx_eq!(
            f64,
            1.0,
            item_comparisons["item-a"]["item-b"],
            ulps = 2
        ));

        // raw cosine of all-positive ratings stays positive even though the
        // rating patterns oppose each other: dot = 18, norms sqrt(42), sqrt(30)
        let expected_a_c = 18.0 / (42.0_f64.sqrt() * 30.0_f64.sqrt());
        assert!(approx_eq!(
            f64,
            expected_a_c,
            item_comparisons["item-a"]["item-c"],
            ulps = 2
        ));
        assert!(expected_a_c > 0.0);
        assert!(expected_a_c < 0.9);

        // only the (a, b) pair clears the threshold, in both directions
        assert_eq!(1, similar_items["item-a"].len());
        assert_eq!(1, similar_items["item-b"].len());
        assert!(!similar_items.contains_key("item-c"));
    }

    #[test]
    fn should_keep_similar_items_a_subset_of_comparisons() {
        let reshaped = reshape(&scenario_rows(), false);
        let (item_comparisons, similar_items) = build_graph(
            &reshaped.item_index,
            &reshaped.user_ratings,
            None,
            &cosine_params(),
        )
        .unwrap();

        for (target_item, similar) in similar_items.iter() {
            for (candidate, score) in similar.iter() {
                assert_eq!(item_comparisons[target_item][candidate], *score);
                assert!(*score >= 0.9);
            }
        }
    }

    #[test]
    fn should_not_score_pairs_below_min_comparisons() {
        // users 1 and 2 co-rate items a and b, item c only has a single
        // co-rater with either
        let rows = vec![
            ("item-a".to_string(), 1, 5.0),
            ("item-b".to_string(), 1, 4.0),
            ("item-a".to_string(), 2, 3.0),
            ("item-b".to_string(), 2, 2.0),
            ("item-c".to_string(), 2, 1.0),
        ];
        let reshaped = reshape(&rows, false);
        let (item_comparisons, _similar_items) = build_graph(
            &reshaped.item_index,
            &reshaped.user_ratings,
            None,
            &cosine_params(),
        )
        .unwrap();

        assert!(item_comparisons["item-a"].contains_key("item-b"));
        assert!(!item_comparisons["item-a"].contains_key("item-c"));
        assert!(!item_comparisons.contains_key("item-c"));
    }

    #[test]
    fn should_clamp_min_comparisons_to_one() {
        let rows = vec![
            ("item-a".to_string(), 1, 5.0),
            ("item-b".to_string(), 1, 4.0),
        ];
        let reshaped = reshape(&rows, false);
        let params = BuildParams {
            similarity: Similarity::Cosine,
            min_comparisons: 0,
            threshold: 0.0,
        };
        let (item_comparisons, _similar_items) =
            build_graph(&reshaped.item_index, &reshaped.user_ratings, None, &params).unwrap();

        // a single co-rating is enough once the zero is clamped
        assert!(item_comparisons["item-a"].contains_key("item-b"));
    }

    #[test]
    fn should_reject_threshold_outside_similarity_range() {
        let reshaped = reshape(&scenario_rows(), false);
        let params = BuildParams {
            similarity: Similarity::Cosine,
            min_comparisons: 2,
            threshold: 1.5,
        };
        let result = build_graph(&reshaped.item_index, &reshaped.user_ratings, None, &params);
        assert!(matches!(result, Err(BuildError::ThresholdOutOfRange(_))));
    }

    #[test]
    fn should_require_user_means_for_adjusted_cosine() {
        let reshaped = reshape(&scenario_rows(), false);
        let params = BuildParams {
            similarity: Similarity::AdjustedCosine,
            min_comparisons: 2,
            threshold: 0.5,
        };
        let result = build_graph(&reshaped.item_index, &reshaped.user_ratings, None, &params);
        assert!(matches!(result, Err(BuildError::MissingUserMeans)));
    }

    #[test]
    fn should_center_ratings_in_adjusted_mode() {
        let reshaped = reshape(&scenario_rows(), true);
        let user_means = reshaped.user_means.as_ref().unwrap();
        let params = BuildParams {
            similarity: Similarity::AdjustedCosine,
            min_comparisons: 2,
            threshold: 0.5,
        };
        let (item_comparisons, similar_items) = build_graph(
            &reshaped.item_index,
            &reshaped.user_ratings,
            Some(user_means),
            &params,
        )
        .unwrap();

        // centering exposes the opposed pattern between items a and c:
        // means are 11/3, 10/3 and 7/3, both centered vectors flip sign
        assert!(item_comparisons["item-a"]["item-c"] < 0.0);
        assert!(item_comparisons["item-a"]["item-b"] > 0.9);
        assert!(similar_items["item-a"].contains_key("item-b"));
        assert!(!similar_items["item-a"].contains_key("item-c"));
    }

    #[test]
    fn should_round_trip_the_exported_graph() {
        let reshaped = reshape(&scenario_rows(), false);
        let (_item_comparisons, similar_items) = build_graph(
            &reshaped.item_index,
            &reshaped.user_ratings,
            None,
            &cosine_params(),
        )
        .unwrap();

        let saved = SavedGraph {
            similarity: Similarity::Cosine,
            threshold: 0.9,
            min_comparisons: 2,
            similar_items: similar_items.clone(),
        };
        let path = std::env::temp_dir().join("encore_graph_round_trip.bin");
        let path = path.to_str().unwrap();
        save_graph(&saved, path).unwrap();
        let loaded = load_graph(path).unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(Similarity::Cosine, loaded.similarity);
        assert_eq!(0.9, loaded.threshold);
        assert_eq!(2, loaded.min_comparisons);
        assert_eq!(similar_items, loaded.similar_items);

        // a model rebuilt from the imported graph predicts without refitting
        let model = ItemKnn::from_graph(loaded.similar_items);
        let mut user_ratings: HashMap<ItemId, f64> = HashMap::new();
        user_ratings.insert("item-b".to_string(), 4.0);
        let predicted = model.predict_one(&user_ratings, "item-a").unwrap();
        assert!(approx_eq!(f64, 4.0, predicted, ulps = 2));
    }

    #[test]
    fn should_detect_graph_built_with_other_parameters() {
        let saved = SavedGraph {
            similarity: Similarity::Cosine,
            threshold: 0.9,
            min_comparisons: 2,
            similar_items: ScoreMap::new(),
        };
        assert!(saved.matches_params(&cosine_params()));

        let mut other_threshold = cosine_params();
        other_threshold.threshold = 0.5;
        assert!(!saved.matches_params(&other_threshold));

        let mut other_mode = cosine_params();
        other_mode.similarity = Similarity::AdjustedCosine;
        assert!(!saved.matches_params(&other_mode));

        let mut other_gate = cosine_params();
        other_gate.min_comparisons = 4;
        assert!(!saved.matches_params(&other_gate));
    }

    #[test]
    fn should_skip_items_without_raters() {
        let reshaped = reshape(&[], false);
        let (item_comparisons, similar_items) = build_graph(
            &reshaped.item_index,
            &reshaped.user_ratings,
            None,
            &cosine_params(),
        )
        .unwrap();

        assert!(item_comparisons.is_empty());
        assert!(similar_items.is_empty());
    }
}
