use std::path::Path;
use std::str::FromStr;

use anyhow::Context;

use encore::config::AppConfig;
use encore::io;
use encore::itemknn::graph::{load_graph, save_graph, BuildParams, SavedGraph};
use encore::itemknn::model::ItemKnn;
use encore::itemknn::similarity::Similarity;
use encore::reshape::reshape;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_default();
    let user_id: io::UserId = std::env::args()
        .nth(2)
        .context("user id not specified")?
        .parse()
        .context("user id must be numeric")?;
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

    let user_ratings = io::user_vector(&rows, user_id);
    if user_ratings.is_empty() {
        anyhow::bail!("user {} has no ratings in the training data", user_id);
    }

    let similarity = Similarity::from_str(&config.model.similarity)?;
    let params = BuildParams {
        similarity,
        min_comparisons: config.model.min_comparisons,
        threshold: config.model.similarity_threshold,
    };

    let graph_cache_path = &config.model.graph_cache_path;
    let model = if !graph_cache_path.is_empty() && Path::new(graph_cache_path).is_file() {
        println!("loading similarity graph from {}", graph_cache_path);
        let saved = load_graph(graph_cache_path)?;
        if !saved.matches_params(&params) {
            println!(
                "warning: cached graph was built with similarity={} threshold={} \
                 min_comparisons={}, config asks for similarity={} threshold={} \
                 min_comparisons={}; delete {} to rebuild",
                saved.similarity,
                saved.threshold,
                saved.min_comparisons,
                params.similarity,
                params.threshold,
                params.min_comparisons,
                graph_cache_path
            );
        }
        ItemKnn::from_graph(saved.similar_items)
    } else {
        let reshaped = reshape(&rows, true);
        let model = ItemKnn::fit(
            &reshaped.item_index,
            &reshaped.user_ratings,
            reshaped.user_means.as_ref(),
            &params,
        )?;
        if !graph_cache_path.is_empty() {
            let saved = SavedGraph {
                similarity,
                threshold: params.threshold,
                min_comparisons: params.min_comparisons,
                similar_items: model.similar_items().clone(),
            };
            save_graph(&saved, graph_cache_path)?;
            println!("exported similarity graph to {}", graph_cache_path);
        }
        model
    };

    let recommendations = model.top_n(&user_ratings, config.model.num_items_to_recommend);

    let titles = if config.data.item_titles_path.is_empty() {
        Default::default()
    } else {
        io::read_item_titles(&config.data.item_titles_path)?
    };

    println!("recommendations for user {}:", user_id);
    for item_id in recommendations.into_iter() {
        match titles.get(&item_id) {
            Some(title) => println!("{}\t{}", item_id, title),
            None => println!("{}", item_id),
        }
    }
    Ok(())
}
