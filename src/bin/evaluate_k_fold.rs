use std::str::FromStr;

use indicatif::ProgressBar;

use encore::config::AppConfig;
use encore::io;
use encore::itemknn::graph::BuildParams;
use encore::itemknn::model::ItemKnn;
use encore::itemknn::similarity::Similarity;
use encore::metrics::mae::mean_absolute_error;
use encore::reshape::reshape;
use encore::split::{k_fold_split, KFold};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_default();
    let config = AppConfig::new(config_path);

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.runtime.num_workers)
        .build_global()?;

    let rows = io::read_ratings_data(&config.data.ratings_data_path)?;
    let rows = io::prune_sparse_ratings(
        rows,
        config.data.min_item_ratings,
        config.data.min_user_ratings,
    );
    io::determine_ratings_data_stats(&config.data.ratings_data_path, &rows);

    let similarity = Similarity::from_str(&config.model.similarity)?;
    let reshaped = reshape(&rows, true);

    let params = BuildParams {
        similarity,
        min_comparisons: config.model.min_comparisons,
        threshold: config.model.similarity_threshold,
    };

    let folds = KFold::new(config.eval.num_folds, config.eval.seed)?
        .assign(&reshaped.user_ratings);

    let progress = ProgressBar::new(folds.len() as u64);
    let mut total_error = 0.0;
    let mut qty_scored_folds = 0;
    for (fold_idx, fold) in folds.iter().enumerate() {
        progress.inc(1);
        let split = k_fold_split(&reshaped.user_ratings, fold, config.eval.items_to_omit);
        let model = ItemKnn::fit(
            &reshaped.item_index,
            &split.train,
            reshaped.user_means.as_ref(),
            &params,
        )?;
        let predicted = model.k_fold_predict(&split.combined);
        match mean_absolute_error(&split.truth, &predicted) {
            Some(mae) => {
                println!("fold {}: MAE {:.4}", fold_idx, mae);
                total_error += mae;
                qty_scored_folds += 1;
            }
            None => println!("fold {}: no evaluable predictions", fold_idx),
        }
    }
    progress.finish_and_clear();

    if qty_scored_folds > 0 {
        println!(
            "{} ({} of {} folds): MAE {:.4}",
            similarity,
            qty_scored_folds,
            folds.len(),
            total_error / qty_scored_folds as f64
        );
    } else {
        println!("no fold produced evaluable predictions");
    }
    Ok(())
}
