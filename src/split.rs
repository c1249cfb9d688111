use hashbrown::HashMap;
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use thiserror::Error;

use crate::io::{ItemId, MaskedRatings, UserId, UserRatings};

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("test fraction {0} must lie in [0, 1)")]
    InvalidTestFraction(f64),
    #[error("k-fold cross validation needs at least two folds, got {0}")]
    TooFewFolds(usize),
}

pub struct HoldoutSplit {
    pub train: UserRatings,
    /// held-out entries per user, masked to `None`
    pub test_masked: MaskedRatings,
    /// the actual ratings behind the masked entries
    pub test_truth: UserRatings,
}

/// Splits every user's ratings independently: the user's item keys are
/// shuffled with a seeded generator and `floor(n * test_fraction)` of them
/// are held out. Keys are sorted before shuffling so the outcome only
/// depends on the seed, not on map iteration order. With a fraction below
/// one, every user keeps at least one training rating.
pub fn train_test_split(
    user_ratings: &UserRatings,
    test_fraction: f64,
    seed: u64,
) -> Result<HoldoutSplit, SplitError> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(SplitError::InvalidTestFraction(test_fraction));
    }

    let mut rng = Pcg64::seed_from_u64(seed);
    let mut train = UserRatings::new();
    let mut test_masked = MaskedRatings::new();
    let mut test_truth = UserRatings::new();

    for user_id in user_ratings.keys().copied().sorted() {
        let items = &user_ratings[&user_id];
        let mut item_keys: Vec<&ItemId> = items.keys().collect();
        item_keys.sort_unstable();
        item_keys.shuffle(&mut rng);

        let qty_held_out = (items.len() as f64 * test_fraction).floor() as usize;
        for (idx, item_id) in item_keys.into_iter().enumerate() {
            let rating = items[item_id];
            if idx < qty_held_out {
                test_masked
                    .entry(user_id)
                    .or_insert_with(HashMap::new)
                    .insert(item_id.clone(), None);
                test_truth
                    .entry(user_id)
                    .or_insert_with(HashMap::new)
                    .insert(item_id.clone(), rating);
            } else {
                train
                    .entry(user_id)
                    .or_insert_with(HashMap::new)
                    .insert(item_id.clone(), rating);
            }
        }
    }

    Ok(HoldoutSplit {
        train,
        test_masked,
        test_truth,
    })
}

/// One cross-validation fold: a partition of the users, not of their items.
pub struct Fold {
    pub train_users: Vec<UserId>,
    pub test_users: Vec<UserId>,
}

pub struct KFold {
    n_folds: usize,
    seed: u64,
}

impl KFold {
    pub fn new(n_folds: usize, seed: u64) -> Result<KFold, SplitError> {
        if n_folds < 2 {
            return Err(SplitError::TooFewFolds(n_folds));
        }
        Ok(KFold { n_folds, seed })
    }

    /// Shuffles the sorted user ids once and cuts them into `n_folds`
    /// contiguous test chunks; the first `qty_users % n_folds` folds take one
    /// extra user.
    pub fn assign(&self, user_ratings: &UserRatings) -> Vec<Fold> {
        let mut users: Vec<UserId> = user_ratings.keys().copied().collect();
        users.sort_unstable();
        let mut rng = Pcg64::seed_from_u64(self.seed);
        users.shuffle(&mut rng);

        let qty_users = users.len();
        let mut folds = Vec::with_capacity(self.n_folds);
        let mut start = 0;
        for fold_idx in 0..self.n_folds {
            let mut size = qty_users / self.n_folds;
            if fold_idx < qty_users % self.n_folds {
                size += 1;
            }
            let test_users = users[start..start + size].to_vec();
            let train_users = users[..start]
                .iter()
                .chain(users[start + size..].iter())
                .copied()
                .collect();
            folds.push(Fold {
                train_users,
                test_users,
            });
            start += size;
        }
        folds
    }
}

pub struct KFoldSplit {
    pub train: UserRatings,
    /// test users' ratings with the first `items_to_omit` items masked to
    /// `None` and the rest visible in the same map
    pub combined: MaskedRatings,
    pub truth: UserRatings,
}

/// Partitions by fold of users: training-fold users contribute all their
/// ratings to train, test-fold users get their first `items_to_omit` items in
/// ascending item-id order masked, with the remainder kept as visible context.
pub fn k_fold_split(
    user_ratings: &UserRatings,
    fold: &Fold,
    items_to_omit: usize,
) -> KFoldSplit {
    let mut train = UserRatings::new();
    let mut combined = MaskedRatings::new();
    let mut truth = UserRatings::new();

    for user_id in fold.train_users.iter() {
        if let Some(items) = user_ratings.get(user_id) {
            train.insert(*user_id, items.clone());
        }
    }

    for user_id in fold.test_users.iter() {
        if let Some(items) = user_ratings.get(user_id) {
            let mut item_keys: Vec<&ItemId> = items.keys().collect();
            item_keys.sort_unstable();

            let mut combined_items: HashMap<ItemId, Option<f64>> =
                HashMap::with_capacity(items.len());
            for (idx, item_id) in item_keys.into_iter().enumerate() {
                let rating = items[item_id];
                if idx < items_to_omit {
                    combined_items.insert(item_id.clone(), None);
                    truth
                        .entry(*user_id)
                        .or_insert_with(HashMap::new)
                        .insert(item_id.clone(), rating);
                } else {
                    combined_items.insert(item_id.clone(), Some(rating));
                }
            }
            combined.insert(*user_id, combined_items);
        }
    }

    KFoldSplit {
        train,
        combined,
        truth,
    }
}
