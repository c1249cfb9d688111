use std::str::FromStr;
use std::time::Instant;

use indicatif::ProgressBar;

use encore::config::AppConfig;
use encore::io;
use encore::io::MaskedRatings;
use encore::itemknn::graph::BuildParams;
use encore::itemknn::model::ItemKnn;
use encore::itemknn::similarity::Similarity;
use encore::metrics::mae::mean_absolute_error;
use encore::reshape::reshape;
use encore::split::train_test_split;
use encore::stopwatch::Stopwatch;

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

    let split = train_test_split(
        &reshaped.user_ratings,
        config.eval.test_fraction,
        config.eval.seed,
    )?;

    let params = BuildParams {
        similarity,
        min_comparisons: config.model.min_comparisons,
        threshold: config.model.similarity_threshold,
    };
    let start_time = Instant::now();
    let model = ItemKnn::fit(
        &reshaped.item_index,
        &split.train,
        reshaped.user_means.as_ref(),
        &params,
    )?;
    println!(
        "similarity graph build:{} micros",
        start_time.elapsed().as_micros()
    );
    println!(
        "items with similar items: {}",
        model.similar_items().len()
    );

    let mut stopwatch = Stopwatch::new();
    let progress = ProgressBar::new(split.test_masked.len() as u64);
    let mut predicted = MaskedRatings::new();
    for (user_id, unknown_items) in split.test_masked.iter() {
        progress.inc(1);
        let mut single_user = MaskedRatings::new();
        single_user.insert(*user_id, unknown_items.clone());
        stopwatch.start();
        let user_predictions = model.predict(&single_user, &split.train);
        stopwatch.stop();
        predicted.extend(user_predictions);
    }
    progress.finish_and_clear();

    println!("===============================================================");
    println!("===              START EVALUATING HELD-OUT DATA            ====");
    println!("===============================================================");
    match mean_absolute_error(&split.test_truth, &predicted) {
        Some(mae) => println!("MAE: {:.4}", mae),
        None => println!("MAE: no evaluable predictions"),
    }
    println!("Qty evaluated users: {}", stopwatch.get_n());
    println!("Prediction latency");
    println!(
        "p90 (microseconds): {}",
        stopwatch.get_percentile_in_micros(90.0)
    );
    println!(
        "p95 (microseconds): {}",
        stopwatch.get_percentile_in_micros(95.0)
    );
    println!(
        "p99.5 (microseconds): {}",
        stopwatch.get_percentile_in_micros(99.5)
    );
    Ok(())
}
