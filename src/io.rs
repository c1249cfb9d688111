use csv::ReaderBuilder;
use hashbrown::{HashMap, HashSet};
use num_format::{Locale, ToFormattedString};
use thiserror::Error;

pub type UserId = u32;
pub type ItemId = String;
pub type Rating = f64;

/// One observation from the ratings data: the rated item, the user who rated
/// it and the rating value.
pub type RatingRow = (ItemId, UserId, Rating);

pub type UserRatings = HashMap<UserId, HashMap<ItemId, Rating>>;

/// Per-user rating maps where held-out entries are `None`.
pub type MaskedRatings = HashMap<UserId, HashMap<ItemId, Option<Rating>>>;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("unable to read ratings data: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads `user;item;rating` records from a semicolon-separated csv file with
/// a header row. Ratings of zero mean "no opinion" in the source data and are
/// dropped here so they cannot skew the similarity computation.
pub fn read_ratings_data(ratings_data_path: &str) -> Result<Vec<RatingRow>, DataError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .escape(Some(b'\\'))
        .from_path(ratings_data_path)?;

    let mut rows: Vec<RatingRow> = Vec::new();
    for record in reader.deserialize() {
        let (user_id, item_id, rating): (UserId, ItemId, Rating) = record?;
        if rating != 0.0 {
            rows.push((item_id, user_id, rating));
        }
    }
    Ok(rows)
}

/// Reads an item-id to title lookup from the first two columns of an item
/// metadata file. Used for presentation only.
pub fn read_item_titles(item_data_path: &str) -> Result<HashMap<ItemId, String>, DataError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .escape(Some(b'\\'))
        .flexible(true)
        .from_path(item_data_path)?;

    let mut titles: HashMap<ItemId, String> = HashMap::new();
    for record in reader.records() {
        let record = record?;
        if let (Some(item_id), Some(title)) = (record.get(0), record.get(1)) {
            titles.insert(item_id.to_string(), title.to_string());
        }
    }
    Ok(titles)
}

/// Drops items with fewer than `min_item_ratings` ratings and then users with
/// fewer than `min_user_ratings` remaining ratings. Items rated only a couple
/// of times produce similarity scores without support.
pub fn prune_sparse_ratings(
    rows: Vec<RatingRow>,
    min_item_ratings: usize,
    min_user_ratings: usize,
) -> Vec<RatingRow> {
    let mut qty_per_item: HashMap<ItemId, usize> = HashMap::new();
    for (item_id, _user_id, _rating) in rows.iter() {
        *qty_per_item.entry(item_id.clone()).or_insert(0) += 1;
    }
    let rows: Vec<RatingRow> = rows
        .into_iter()
        .filter(|(item_id, _user_id, _rating)| qty_per_item[item_id] >= min_item_ratings)
        .collect();

    let mut qty_per_user: HashMap<UserId, usize> = HashMap::new();
    for (_item_id, user_id, _rating) in rows.iter() {
        *qty_per_user.entry(*user_id).or_insert(0) += 1;
    }
    rows.into_iter()
        .filter(|(_item_id, user_id, _rating)| qty_per_user[user_id] >= min_user_ratings)
        .collect()
}

/// Collects the ratings of a single user out of the flat rows.
pub fn user_vector(rows: &[RatingRow], user: UserId) -> HashMap<ItemId, Rating> {
    rows.iter()
        .filter(|(_item_id, user_id, _rating)| *user_id == user)
        .map(|(item_id, _user_id, rating)| (item_id.clone(), *rating))
        .collect()
}

pub struct RatingsDataStats {
    pub qty_records: usize,
    pub qty_unique_users: usize,
    pub qty_unique_items: usize,
}

pub fn determine_ratings_data_stats(
    descriptive_name: &str,
    rows: &[RatingRow],
) -> RatingsDataStats {
    let qty_records = rows.len();

    let unique_users: HashSet<UserId> = rows
        .iter()
        .map(|(_item_id, user_id, _rating)| *user_id)
        .collect();
    let unique_items: HashSet<&str> = rows
        .iter()
        .map(|(item_id, _user_id, _rating)| item_id.as_str())
        .collect();

    println!("Loaded {}", descriptive_name);
    println!(
        "\tRatings: {}",
        qty_records.to_formatted_string(&Locale::en)
    );
    println!(
        "\tUsers: {}",
        unique_users.len().to_formatted_string(&Locale::en)
    );
    println!(
        "\tItems: {}",
        unique_items.len().to_formatted_string(&Locale::en)
    );

    RatingsDataStats {
        qty_records,
        qty_unique_users: unique_users.len(),
        qty_unique_items: unique_items.len(),
    }
}
