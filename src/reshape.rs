use hashbrown::HashMap;

use crate::io::{ItemId, RatingRow, UserId, UserRatings};

/// The two lookup structures the similarity engine works from, built once per
/// fit and read-only afterwards.
pub struct Reshaped {
    /// item id to the users that rated it, in first-seen order
    pub item_index: HashMap<ItemId, Vec<UserId>>,
    pub user_ratings: UserRatings,
    /// per-user mean rating, only present when requested for adjusted cosine
    pub user_means: Option<HashMap<UserId, f64>>,
}

/// Regroups flat `(item, user, rating)` rows by item and by user. When the
/// input contains duplicate `(user, item)` pairs the last rating wins.
pub fn reshape(rows: &[RatingRow], compute_means: bool) -> Reshaped {
    let mut item_index: HashMap<ItemId, Vec<UserId>> = HashMap::new();
    let mut user_ratings: UserRatings = UserRatings::new();

    for (item_id, user_id, rating) in rows.iter() {
        item_index
            .entry(item_id.clone())
            .or_insert_with(Vec::new)
            .push(*user_id);
        user_ratings
            .entry(*user_id)
            .or_insert_with(HashMap::new)
            .insert(item_id.clone(), *rating);
    }

    let user_means = if compute_means {
        let means = user_ratings
            .iter()
            .map(|(user_id, ratings)| {
                let mean = ratings.values().sum::<f64>() / ratings.len() as f64;
                (*user_id, mean)
            })
            .collect();
        Some(means)
    } else {
        None
    };

    Reshaped {
        item_index,
        user_ratings,
        user_means,
    }
}

#[cfg(test)]
mod reshape_test {
    use super::*;

    #[test]
    fn should_group_by_item_and_by_user() {
        let rows = vec![
            ("item-a".to_string(), 1, 5.0),
            ("item-a".to_string(), 2, 4.0),
            ("item-b".to_string(), 1, 1.0),
        ];

        let reshaped = reshape(&rows, false);

        assert_eq!(vec![1, 2], reshaped.item_index["item-a"]);
        assert_eq!(vec![1], reshaped.item_index["item-b"]);
        assert_eq!(5.0, reshaped.user_ratings[&1]["item-a"]);
        assert_eq!(1.0, reshaped.user_ratings[&1]["item-b"]);
        assert_eq!(4.0, reshaped.user_ratings[&2]["item-a"]);
        assert!(reshaped.user_means.is_none());
    }

    #[test]
    fn should_compute_user_means_on_request() {
        let rows = vec![
            ("item-a".to_string(), 1, 2.0),
            ("item-b".to_string(), 1, 4.0),
            ("item-a".to_string(), 2, 10.0),
        ];

        let reshaped = reshape(&rows, true);
        let user_means = reshaped.user_means.unwrap();

        assert_eq!(3.0, user_means[&1]);
        assert_eq!(10.0, user_means[&2]);
    }

    #[test]
    fn should_let_the_last_duplicate_rating_win() {
        let rows = vec![
            ("item-a".to_string(), 1, 2.0),
            ("item-a".to_string(), 1, 9.0),
        ];

        let reshaped = reshape(&rows, false);

        assert_eq!(9.0, reshaped.user_ratings[&1]["item-a"]);
        // the item index keeps both observations, duplicates are assumed
        // absent from real input
        assert_eq!(vec![1, 1], reshaped.item_index["item-a"]);
    }

    #[test]
    fn should_yield_empty_maps_for_empty_input() {
        let reshaped = reshape(&[], true);

        assert!(reshaped.item_index.is_empty());
        assert!(reshaped.user_ratings.is_empty());
        assert!(reshaped.user_means.unwrap().is_empty());
    }
}
