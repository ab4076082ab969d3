use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::debug;
use ndarray::prelude::*;

use crate::config::MatchConfig;
use crate::descriptor::DescriptorSet;
use crate::error::{LoopError, Result};

/// 查询集与数据库之间的相似度矩阵，形状为 (num_query, num_db)
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    data: Array2<f32>,
}

impl SimilarityMatrix {
    /// 计算相似度矩阵
    ///
    /// 相似度为描述符内积，描述符应当已经归一化。
    /// 当 `config.causal_mask` 开启时，查询帧 i 不能匹配数据库中位于它之后的帧 j > i。
    pub fn build(query: &DescriptorSet, db: &DescriptorSet, config: &MatchConfig) -> Result<Self> {
        if query.is_empty() {
            return Err(LoopError::EmptyInput("query"));
        }
        if db.is_empty() {
            return Err(LoopError::EmptyInput("database"));
        }
        if query.dim() != db.dim() {
            return Err(LoopError::DimensionMismatch { expected: query.dim(), actual: db.dim() });
        }
        if let Some(dim) = config.dim {
            if query.dim() != dim {
                return Err(LoopError::DimensionMismatch { expected: dim, actual: query.dim() });
            }
        }

        let mut data = query.view().dot(&db.view().t());
        if config.causal_mask {
            apply_causal_mask(&mut data);
        }
        debug!("相似度矩阵形状：{:?}，因果掩码：{}", data.dim(), config.causal_mask);

        Ok(Self { data })
    }

    pub fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// (num_query, num_db)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn num_query(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_db(&self) -> usize {
        self.data.ncols()
    }

    pub fn get(&self, query: usize, db: usize) -> Option<f32> {
        self.data.get((query, db)).copied()
    }

    /// 查询帧到所有数据库帧的相似度
    pub fn row(&self, query: usize) -> Result<ArrayView1<'_, f32>> {
        if query >= self.num_query() {
            return Err(LoopError::IndexOutOfRange { index: query, len: self.num_query() });
        }
        Ok(self.data.row(query))
    }

    /// 以制表符分隔、保留 4 位小数的文本格式写出
    pub fn write_txt<W: Write>(&self, mut w: W) -> Result<()> {
        for row in self.data.outer_iter() {
            let mut first = true;
            for v in row {
                if !first {
                    w.write_all(b"\t")?;
                }
                write!(w, "{v:.4}")?;
                first = false;
            }
            w.write_all(b"\n")?;
        }
        w.flush()?;
        Ok(())
    }

    /// 读取 [`write_txt`](Self::write_txt) 的输出，`path` 只用于错误信息
    pub fn read_txt<R: BufRead>(reader: R, path: &Path) -> Result<Self> {
        let mut flat = vec![];
        let mut ncols = None;
        let mut nrows = 0;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let start = flat.len();
            for field in line.split('\t') {
                let v = field.trim().parse::<f32>().map_err(|e| {
                    LoopError::corrupt(path, format!("line {}: {field:?}: {e}", lineno + 1))
                })?;
                flat.push(v);
            }
            let len = flat.len() - start;
            match ncols {
                None => ncols = Some(len),
                Some(n) if n != len => {
                    return Err(LoopError::corrupt(
                        path,
                        format!("line {} has {len} columns, expected {n}", lineno + 1),
                    ));
                }
                _ => {}
            }
            nrows += 1;
        }

        let Some(ncols) = ncols else {
            return Err(LoopError::corrupt(path, "no rows"));
        };
        let data = Array2::from_shape_vec((nrows, ncols), flat)
            .map_err(|e| LoopError::corrupt(path, e.to_string()))?;
        Ok(Self { data })
    }

    pub fn save_txt(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write_txt(BufWriter::new(file))
    }

    pub fn load_txt(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::read_txt(BufReader::new(file), path)
    }
}

/// 将对角线以上 (j > i) 的项置零，按行切片填充
pub fn apply_causal_mask(m: &mut Array2<f32>) {
    let ncols = m.ncols();
    for (i, mut row) in m.outer_iter_mut().enumerate() {
        let start = (i + 1).min(ncols);
        row.slice_mut(s![start..]).fill(0.0);
    }
}
