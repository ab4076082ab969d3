use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{MatchConfig, MatchOptions, Opts, Split};
use crate::{DescriptorSet, SimilarityMatrix};

#[derive(Parser, Debug, Clone)]
pub struct SimilarityCommand {
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 数据库描述符，默认使用缓存目录中的 global_descriptors_db.npy
    #[arg(long, value_name = "NPY")]
    pub database: Option<PathBuf>,
    /// 查询描述符，默认使用缓存目录中的 global_descriptors_query.npy，
    /// 不存在时与数据库相同，即在同一条轨迹内检测回环
    #[arg(long, value_name = "NPY")]
    pub query: Option<PathBuf>,
    /// 计算前对描述符做 L2 归一化
    #[arg(long)]
    pub normalize: bool,
    /// 相似度矩阵输出路径，默认写入缓存目录
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl SubCommandExtend for SimilarityCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let config = MatchConfig::from(&self.matching);
        let db_path =
            self.database.clone().unwrap_or_else(|| opts.cache_dir.descriptors(Split::Database));

        let matrix = block_in_place(|| -> Result<SimilarityMatrix> {
            let mut db = load_descriptors(&db_path)?;
            let query_path = self.query.clone().or_else(|| {
                let cached = opts.cache_dir.descriptors(Split::Query);
                cached.exists().then_some(cached)
            });
            let mut query = query_path.as_deref().map(load_descriptors).transpose()?;
            if self.normalize {
                db = db.normalized();
                query = query.map(|q| q.normalized());
            }
            let query = query.as_ref().unwrap_or(&db);
            info!("查询帧 {} 张，数据库 {} 张，维度 {}", query.len(), db.len(), db.dim());
            Ok(SimilarityMatrix::build(query, &db, &config)?)
        })?;

        let output = match &self.output {
            Some(output) => output.clone(),
            None => {
                opts.cache_dir.ensure()?;
                opts.cache_dir.similarity()
            }
        };
        block_in_place(|| matrix.save_txt(&output))?;
        info!("相似度矩阵 {:?} 已保存到 {}", matrix.shape(), output.display());
        Ok(())
    }
}

fn load_descriptors(path: &Path) -> Result<DescriptorSet> {
    DescriptorSet::load_npy(path).with_context(|| format!("无法读取描述符 {}", path.display()))
}
