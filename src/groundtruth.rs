use std::path::Path;

use log::debug;
use ndarray::prelude::*;
use ndarray_npy::{ReadNpyError, read_npy};
use rayon::prelude::*;
use serde::Serialize;

use crate::candidate::select_all_top_k;
use crate::config::MatchConfig;
use crate::error::{LoopError, Result};
use crate::similarity::SimilarityMatrix;

/// 回环真值：N×N 的 0/1 矩阵，(i, j) 为 1 表示第 i 帧和第 j 帧拍摄于同一地点
#[derive(Debug, Clone)]
pub struct GroundTruth {
    truth: Array2<u8>,
}

impl GroundTruth {
    pub fn from_array(truth: Array2<u8>) -> Result<Self> {
        let (rows, cols) = truth.dim();
        if rows != cols {
            return Err(LoopError::NotSquare { rows, cols });
        }
        Ok(Self { truth })
    }

    /// 读取 npy 格式的真值，支持 u8 和 f64（从 .mat 导出的矩阵一般是 f64）
    pub fn load_npy(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let truth = match read_npy::<_, Array2<u8>>(path) {
            Ok(truth) => truth,
            Err(ReadNpyError::WrongDescriptor(_)) => {
                debug!("{} 不是 u8 数组，尝试按 f64 读取", path.display());
                read_npy::<_, Array2<f64>>(path)?.mapv(|v| u8::from(v != 0.0))
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_array(truth)
    }

    /// 图片数量
    pub fn len(&self) -> usize {
        self.truth.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.truth.is_empty()
    }

    /// i 和 j 是否为同一地点，自身不算
    pub fn is_loop(&self, i: usize, j: usize) -> bool {
        i != j && self.truth.get((i, j)).is_some_and(|&v| v != 0)
    }

    /// 与第 q 帧为同一地点的其他帧，按帧号升序
    pub fn matches(&self, q: usize) -> Result<Vec<usize>> {
        if q >= self.len() {
            return Err(LoopError::IndexOutOfRange { index: q, len: self.len() });
        }
        Ok(self
            .truth
            .row(q)
            .indexed_iter()
            .filter(|&(j, &v)| j != q && v != 0)
            .map(|(j, _)| j)
            .collect())
    }

    /// 每一帧的回环数量
    pub fn loop_counts(&self) -> Vec<usize> {
        self.truth
            .outer_iter()
            .enumerate()
            .map(|(i, row)| row.indexed_iter().filter(|&(j, &v)| j != i && v != 0).count())
            .collect()
    }
}

/// 回环候选与真值对比的统计结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvalReport {
    /// 参与评估的查询帧数量
    pub queries: usize,
    /// 至少有一个候选的查询帧数量
    pub detected: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    /// 可以被检测到但没有出现在候选中的回环
    pub false_negatives: usize,
}

impl EvalReport {
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    fn merge(mut self, other: Self) -> Self {
        self.queries += other.queries;
        self.detected += other.detected;
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
        self
    }
}

fn ratio(a: usize, b: usize) -> f64 {
    if b == 0 { 0.0 } else { a as f64 / b as f64 }
}

/// 对每个查询帧取 top-k 候选，并与真值比较
///
/// 开启因果掩码时，位于查询帧之后的真值回环不计入漏检。
pub fn evaluate(matrix: &SimilarityMatrix, gt: &GroundTruth, config: &MatchConfig) -> Result<EvalReport> {
    let (num_query, num_db) = matrix.shape();
    for n in [num_query, num_db] {
        if n > gt.len() {
            return Err(LoopError::IndexOutOfRange { index: n - 1, len: gt.len() });
        }
    }

    let candidates = select_all_top_k(matrix, config.top_k, config.threshold);
    let report = candidates
        .par_iter()
        .enumerate()
        .map(|(q, found)| {
            let tp = found.iter().filter(|c| gt.is_loop(q, c.index)).count();
            let reachable = (0..num_db)
                .filter(|&j| gt.is_loop(q, j) && (!config.causal_mask || j < q))
                .filter(|&j| !found.iter().any(|c| c.index == j))
                .count();
            EvalReport {
                queries: 1,
                detected: usize::from(!found.is_empty()),
                true_positives: tp,
                false_positives: found.len() - tp,
                false_negatives: reachable,
            }
        })
        .reduce(EvalReport::default, EvalReport::merge);

    debug!("评估结果：{report:?}");
    Ok(report)
}
