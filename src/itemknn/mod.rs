use std::cmp::Ordering;

use crate::io::ItemId;

pub mod graph;
pub mod model;
pub mod similarity;

#[derive(PartialEq, Debug)]
pub struct ItemScore {
    pub id: ItemId,
    pub score: f64,
}

impl ItemScore {
    pub(crate) fn new(id: ItemId, score: f64) -> Self {
        ItemScore { id, score }
    }
}

impl Eq for ItemScore {}

impl Ord for ItemScore {
    fn cmp(&self, other: &Self) -> Ordering {
        // reverse order by score, equal scores order by ascending item id
        match self.score.partial_cmp(&other.score) {
            Some(Ordering::Less) => Ordering::Greater,
            Some(Ordering::Greater) => Ordering::Less,
            _ => self.id.cmp(&other.id),
        }
    }
}

impl PartialOrd for ItemScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
