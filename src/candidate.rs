use std::cmp::Ordering;

use ndarray::ArrayView1;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::similarity::SimilarityMatrix;

/// 一个回环候选：数据库中的帧号及其相似度
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub index: usize,
    pub score: f32,
}

/// 将一行相似度按降序排列，返回完整的下标排列
///
/// 分数相同时下标小的在前，NaN 排在最后。
pub fn rank_row(row: ArrayView1<f32>) -> Vec<usize> {
    let mut order = (0..row.len()).collect::<Vec<_>>();
    // sort_by 是稳定排序，相等的分数保持下标升序
    order.sort_by(|&a, &b| descending(row[a], row[b]));
    order
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

fn top_k_of_row(row: ArrayView1<f32>, k: usize, threshold: f32) -> Vec<Candidate> {
    rank_row(row)
        .into_iter()
        .take(k)
        .map(|index| Candidate { index, score: row[index] })
        .filter(|c| c.score >= threshold)
        .collect()
}

/// 取相似度最高的 k 个数据库帧，再过滤掉低于阈值的
///
/// 返回结果按相似度降序排列，可能为空，表示没有检测到回环。
pub fn select_top_k(
    matrix: &SimilarityMatrix,
    query: usize,
    k: usize,
    threshold: f32,
) -> Result<Vec<Candidate>> {
    Ok(top_k_of_row(matrix.row(query)?, k, threshold))
}

/// 对每一个查询帧执行 [`select_top_k`]
pub fn select_all_top_k(matrix: &SimilarityMatrix, k: usize, threshold: f32) -> Vec<Vec<Candidate>> {
    let view = matrix.view();
    (0..matrix.num_query())
        .into_par_iter()
        .map(|q| top_k_of_row(view.row(q), k, threshold))
        .collect()
}

/// 查询帧的时间邻域：与查询帧距离小于 `radius` 的帧，以及查询帧本身
pub fn in_window(index: usize, query: usize, radius: usize) -> bool {
    index == query || index.abs_diff(query) < radius
}

/// 排除查询帧邻域之后，相似度最高的数据库帧
///
/// 所有帧都落在邻域内时返回 `None`。
pub fn select_best_excluding_window(
    matrix: &SimilarityMatrix,
    query: usize,
    window_radius: usize,
) -> Result<Option<Candidate>> {
    let row = matrix.row(query)?;
    Ok(rank_row(row)
        .into_iter()
        .find(|&index| !in_window(index, query, window_radius))
        .map(|index| Candidate { index, score: row[index] }))
}
