use loopsim::candidate::{select_all_top_k, select_best_excluding_window, select_top_k};
use loopsim::groundtruth::{GroundTruth, evaluate};
use loopsim::{DescriptorSet, LoopError, MatchConfig, SimilarityMatrix};
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::*;
use tempfile::TempDir;

const FRAMES: usize = 40;
const DIM: usize = 64;

/// 第 30 帧之后回到第 5 帧开始的地点
fn place_of(frame: usize) -> usize {
    if frame >= 30 { frame - 25 } else { frame }
}

fn random_unit(rng: &mut StdRng) -> Array1<f32> {
    let v = Array1::from_shape_fn(DIM, |_| rng.random_range(-1.0f32..1.0));
    let norm = v.dot(&v).sqrt();
    v / norm
}

#[fixture]
fn trajectory() -> DescriptorSet {
    let mut rng = StdRng::seed_from_u64(42);
    let places = (0..30).map(|_| random_unit(&mut rng)).collect::<Vec<_>>();
    let mut data = Array2::<f32>::zeros((FRAMES, DIM));
    for (i, mut row) in data.outer_iter_mut().enumerate() {
        let mut v = places[place_of(i)].clone();
        if i >= 30 {
            v += &Array1::from_shape_fn(DIM, |_| rng.random_range(-0.05f32..0.05));
        }
        row.assign(&v);
    }
    DescriptorSet::new(data).normalized()
}

#[fixture]
fn matrix(trajectory: DescriptorSet) -> SimilarityMatrix {
    let config = MatchConfig { dim: Some(DIM), ..MatchConfig::default() };
    SimilarityMatrix::build(&trajectory, &trajectory, &config).unwrap()
}

#[fixture]
fn ground_truth() -> GroundTruth {
    let truth = Array2::from_shape_fn((FRAMES, FRAMES), |(i, j)| u8::from(place_of(i) == place_of(j)));
    GroundTruth::from_array(truth).unwrap()
}

#[rstest]
fn future_is_masked(matrix: SimilarityMatrix) {
    assert_eq!(matrix.shape(), (FRAMES, FRAMES));
    for ((i, j), &v) in matrix.view().indexed_iter() {
        if j > i {
            assert_eq!(v, 0.0, "({i}, {j})");
        }
    }
}

#[rstest]
fn diagonal_is_row_maximum(matrix: SimilarityMatrix) {
    for (i, row) in matrix.view().outer_iter().enumerate() {
        let max = row.iter().cloned().fold(f32::MIN, f32::max);
        assert!((row[i] - max).abs() < 1e-6, "row {i}");
    }
}

#[rstest]
#[case(30, 5)]
#[case(32, 7)]
#[case(39, 14)]
fn revisit_found_by_top_k(matrix: SimilarityMatrix, #[case] query: usize, #[case] place: usize) {
    let result = select_top_k(&matrix, query, 5, 0.9).unwrap();
    let indices = result.iter().map(|c| c.index).collect::<Vec<_>>();
    // 自身的相似度最高
    assert_eq!(indices, [query, place]);
}

#[rstest]
#[case(0)]
#[case(15)]
#[case(29)]
fn no_revisit_only_self(matrix: SimilarityMatrix, #[case] query: usize) {
    let result = select_top_k(&matrix, query, 5, 0.9).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].index, query);
}

#[rstest]
fn top_k_properties(matrix: SimilarityMatrix) {
    for k in [1, 3, 10] {
        for threshold in [-1.0, 0.0, 0.2, 0.9] {
            for q in 0..FRAMES {
                let result = select_top_k(&matrix, q, k, threshold).unwrap();
                assert!(result.len() <= k);
                assert!(result.iter().all(|c| c.score >= threshold));
                assert!(result.windows(2).all(|w| w[0].score >= w[1].score));
                assert_eq!(result, select_top_k(&matrix, q, k, threshold).unwrap());
            }
        }
    }
}

#[rstest]
fn best_outside_window(matrix: SimilarityMatrix) {
    let best = select_best_excluding_window(&matrix, 32, 15).unwrap().unwrap();
    assert_eq!(best.index, 7);
    assert!(best.score > 0.9);

    for q in 0..FRAMES {
        for radius in [0, 1, 15] {
            if let Some(c) = select_best_excluding_window(&matrix, q, radius).unwrap() {
                assert_ne!(c.index, q);
                assert!(c.index.abs_diff(q) >= radius);
            }
        }
    }
}

#[rstest]
fn window_covering_everything(matrix: SimilarityMatrix) {
    assert_eq!(select_best_excluding_window(&matrix, 20, FRAMES).unwrap(), None);
}

#[rstest]
fn query_out_of_range(matrix: SimilarityMatrix) {
    assert!(matches!(
        select_top_k(&matrix, FRAMES, 3, 0.0),
        Err(LoopError::IndexOutOfRange { index: FRAMES, len: FRAMES })
    ));
    assert!(select_best_excluding_window(&matrix, FRAMES, 0).is_err());
}

#[rstest]
fn txt_cache_roundtrip(matrix: SimilarityMatrix) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("similarity_matrix.txt");
    matrix.save_txt(&path).unwrap();

    let loaded = SimilarityMatrix::load_txt(&path).unwrap();
    assert_eq!(loaded.shape(), matrix.shape());
    for (a, b) in loaded.view().iter().zip(matrix.view().iter()) {
        assert!((a - b).abs() <= 1e-4);
    }
}

#[rstest]
fn missing_cache_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = SimilarityMatrix::load_txt(dir.path().join("missing.txt"));
    assert!(matches!(result, Err(LoopError::Io(_))));
}

#[rstest]
fn separate_trajectories_unmasked(trajectory: DescriptorSet) {
    let query = DescriptorSet::new(trajectory.view().slice(s![30.., ..]).to_owned());
    let db = DescriptorSet::new(trajectory.view().slice(s![..30, ..]).to_owned());
    let config = MatchConfig { causal_mask: false, ..MatchConfig::default() };
    let matrix = SimilarityMatrix::build(&query, &db, &config).unwrap();
    assert_eq!(matrix.shape(), (10, 30));

    let all = select_all_top_k(&matrix, 1, 0.9);
    for (q, result) in all.iter().enumerate() {
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].index, q + 5);
    }
}

#[rstest]
fn evaluate_against_ground_truth(matrix: SimilarityMatrix, ground_truth: GroundTruth) {
    let config = MatchConfig { top_k: 5, threshold: 0.9, ..MatchConfig::default() };
    let report = evaluate(&matrix, &ground_truth, &config).unwrap();
    assert_eq!(report.queries, FRAMES);
    assert_eq!(report.detected, FRAMES);
    assert_eq!(report.true_positives, 10);
    // 每一帧都匹配到自身
    assert_eq!(report.false_positives, FRAMES);
    assert_eq!(report.false_negatives, 0);
    assert_eq!(report.recall(), 1.0);
}

#[rstest]
fn ground_truth_counts(ground_truth: GroundTruth) {
    let counts = ground_truth.loop_counts();
    assert_eq!(counts.iter().filter(|&&n| n == 1).count(), 20);
    assert_eq!(ground_truth.matches(7).unwrap(), [32]);
    assert_eq!(ground_truth.matches(32).unwrap(), [7]);
}
