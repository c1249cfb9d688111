#[macro_use]
extern crate bencher;
extern crate rand;

use bencher::Bencher;
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;

use encore::itemknn::graph::{build_graph, BuildParams};
use encore::itemknn::similarity::{adjusted_cosine, cosine, Similarity};
use encore::reshape::reshape;

benchmark_group!(benches, bench_cosine, bench_adjusted_cosine, bench_build_graph);
benchmark_main!(benches);

const VECTOR_LENGTH: usize = 1024;

fn random_ratings(seed: u64, qty: usize) -> Vec<f64> {
    let mut rng = Pcg64::seed_from_u64(seed);
    (0..qty).map(|_| rng.gen_range(1.0..=10.0)).collect()
}

fn bench_cosine(bench: &mut Bencher) {
    let vec_a = random_ratings(1, VECTOR_LENGTH);
    let vec_b = random_ratings(2, VECTOR_LENGTH);
    bench.iter(|| cosine(&vec_a, &vec_b).unwrap());
}

fn bench_adjusted_cosine(bench: &mut Bencher) {
    let vec_a = random_ratings(1, VECTOR_LENGTH);
    let vec_b = random_ratings(2, VECTOR_LENGTH);
    let centering = random_ratings(3, VECTOR_LENGTH);
    bench.iter(|| adjusted_cosine(&vec_a, &vec_b, &centering).unwrap());
}

fn bench_build_graph(bench: &mut Bencher) {
    // 200 users rating 40 of 100 items produces a reasonably dense
    // co-rating structure
    let mut rng = Pcg64::seed_from_u64(42);
    let mut rows = Vec::new();
    for user_id in 0..200_u32 {
        for _ in 0..40 {
            let item_id = format!("item-{}", rng.gen_range(0..100));
            let rating = rng.gen_range(1..=10) as f64;
            rows.push((item_id, user_id, rating));
        }
    }
    let reshaped = reshape(&rows, false);
    let params = BuildParams {
        similarity: Similarity::Cosine,
        min_comparisons: 4,
        threshold: 0.5,
    };

    bench.iter(|| {
        build_graph(&reshaped.item_index, &reshaped.user_ratings, None, &params).unwrap()
    });
}
