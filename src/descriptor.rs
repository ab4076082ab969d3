use std::path::{Path, PathBuf};

use anyhow::Context;
use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{debug, info, warn};
use ndarray::prelude::*;
use ndarray_npy::{ReadNpyError, read_npy, write_npy};
use rayon::prelude::*;
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{LoopError, Result};
use crate::utils::{l2_normalize, pb_style};

/// 一组按图片顺序排列的全局描述符，形状为 (N, d)
///
/// 从 f64 缓存读取时保留原始数据，写回缓存时不损失精度，相似度计算仍使用 f32。
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSet {
    data: Array2<f32>,
    wide: Option<Array2<f64>>,
}

impl DescriptorSet {
    pub fn new(data: Array2<f32>) -> Self {
        Self { data, wide: None }
    }

    fn from_wide(wide: Array2<f64>) -> Self {
        Self { data: wide.mapv(|v| v as f32), wide: Some(wide) }
    }

    /// 从若干行向量构建，所有向量的长度必须一致
    pub fn from_rows<V: AsRef<[f32]>>(rows: &[V]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(LoopError::EmptyInput("descriptor"));
        };
        let dim = first.as_ref().len();
        let mut flat = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(LoopError::DimensionMismatch { expected: dim, actual: row.len() });
            }
            flat.extend_from_slice(row);
        }
        let data = Array2::from_shape_vec((rows.len(), dim), flat)
            .map_err(|e| LoopError::InvalidSequence(e.to_string()))?;
        Ok(Self::new(data))
    }

    /// 描述符数量
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// 描述符维度
    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// 返回每一行都做了 L2 归一化的副本，零向量保持不变
    pub fn normalized(&self) -> Self {
        if let Some(wide) = &self.wide {
            let mut wide = wide.clone();
            for row in wide.outer_iter_mut() {
                l2_normalize(row);
            }
            return Self::from_wide(wide);
        }
        let mut data = self.data.clone();
        for row in data.outer_iter_mut() {
            l2_normalize(row);
        }
        Self::new(data)
    }

    /// 读取 npy 格式的描述符缓存，支持 f32 和 f64
    ///
    /// 文件无法解析为二维数组时返回 [`LoopError::CacheCorrupt`]。
    pub fn load_npy(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_npy::<_, Array2<f32>>(path) {
            Ok(data) => Ok(Self::new(data)),
            Err(ReadNpyError::WrongDescriptor(_)) => {
                let wide = read_npy::<_, Array2<f64>>(path).map_err(|e| npy_error(path, e))?;
                warn!("{} 是 f64 数组，相似度将按 f32 计算", path.display());
                Ok(Self::from_wide(wide))
            }
            Err(e) => Err(npy_error(path, e)),
        }
    }

    /// 以全精度写入 npy 缓存，f64 读入的数据仍写为 f64
    pub fn save_npy(&self, path: impl AsRef<Path>) -> Result<()> {
        match &self.wide {
            Some(wide) => write_npy(path, wide)?,
            None => write_npy(path, &self.data)?,
        }
        Ok(())
    }
}

fn npy_error(path: &Path, e: ReadNpyError) -> LoopError {
    match e {
        ReadNpyError::Io(e) => LoopError::Io(e),
        e => LoopError::corrupt(path, e.to_string()),
    }
}

/// 全局描述符提取器，把一张图片映射为固定长度的向量
///
/// 模型本身不在本 crate 的范围内，调用方负责实现并保证输出已经归一化
pub trait DescriptorExtractor: Sync {
    /// 输出向量的维度
    fn dim(&self) -> usize;
    /// 提取单张图片的描述符
    fn extract(&self, image: &Path) -> anyhow::Result<Vec<f32>>;
}

/// 从 0 开始连续编号的图片序列，例如 000000.png, 000001.png ...
#[derive(Debug, Clone)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
}

impl ImageSequence {
    /// 扫描目录下的图片，文件名必须是补零的整数且编号连续
    ///
    /// 参数：
    /// - dir: 图片目录，不递归
    /// - suffix: 扫描的文件后缀名，多个后缀用逗号分隔
    pub fn scan(dir: impl AsRef<Path>, suffix: &str) -> Result<Self> {
        let suffixes = suffix.split(',').map(|s| regex::escape(s.trim())).collect::<Vec<_>>();
        let re = Regex::new(&format!(r"(?i)^(\d+)\.({})$", suffixes.join("|")))
            .map_err(|e| LoopError::InvalidSequence(e.to_string()))?;

        let mut numbered = vec![];
        for entry in WalkDir::new(dir.as_ref()).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| LoopError::InvalidSequence(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let Some(caps) = re.captures(&name) else {
                continue;
            };
            let index = caps[1]
                .parse::<usize>()
                .map_err(|e| LoopError::InvalidSequence(format!("{name}: {e}")))?;
            numbered.push((index, entry.into_path()));
        }

        if numbered.is_empty() {
            return Err(LoopError::EmptyInput("image"));
        }
        numbered.sort_by_key(|(index, _)| *index);

        for (expected, (index, path)) in numbered.iter().enumerate() {
            if *index != expected {
                return Err(LoopError::InvalidSequence(format!(
                    "expected image {expected}, found {}",
                    path.display()
                )));
            }
        }

        debug!("在 {} 中找到 {} 张图片", dir.as_ref().display(), numbered.len());
        Ok(Self { paths: numbered.into_iter().map(|(_, path)| path).collect() })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// 按顺序提取整个序列的描述符
pub fn extract_sequence<E: DescriptorExtractor>(
    extractor: &E,
    images: &ImageSequence,
    desc: &str,
) -> anyhow::Result<DescriptorSet> {
    if images.is_empty() {
        return Err(LoopError::EmptyInput("image").into());
    }

    let dim = extractor.dim();
    let pb = ProgressBar::new(images.len() as u64)
        .with_style(pb_style())
        .with_message(desc.to_owned());

    let rows = images
        .paths()
        .par_iter()
        .progress_with(pb.clone())
        .map(|path| -> anyhow::Result<Vec<f32>> {
            let v = extractor.extract(path).with_context(|| path.display().to_string())?;
            if v.len() != dim {
                return Err(LoopError::DimensionMismatch { expected: dim, actual: v.len() }.into());
            }
            Ok(v)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    pb.finish_with_message(format!("{desc} 完成"));
    Ok(DescriptorSet::from_rows(&rows)?)
}

/// 如果缓存存在则直接读取，否则提取描述符并写入缓存
pub fn extract_or_load<E: DescriptorExtractor>(
    cache: impl AsRef<Path>,
    extractor: &E,
    images: &ImageSequence,
) -> anyhow::Result<DescriptorSet> {
    let cache = cache.as_ref();
    if cache.exists() {
        info!("跳过特征提取，从缓存加载 {}", cache.display());
        let set = DescriptorSet::load_npy(cache)?;
        if set.len() != images.len() {
            return Err(LoopError::corrupt(
                cache,
                format!("cached {} descriptors for {} images", set.len(), images.len()),
            )
            .into());
        }
        if set.dim() != extractor.dim() {
            return Err(
                LoopError::DimensionMismatch { expected: extractor.dim(), actual: set.dim() }.into()
            );
        }
        return Ok(set);
    }

    let set = extract_sequence(extractor, images, "提取特征")?;
    if let Some(parent) = cache.parent() {
        std::fs::create_dir_all(parent)?;
    }
    set.save_npy(cache)?;
    info!("描述符已缓存到 {}", cache.display());
    Ok(set)
}
