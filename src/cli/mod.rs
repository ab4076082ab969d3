mod best;
mod candidates;
mod eval;
mod loops;
mod similarity;

pub use best::*;
pub use candidates::*;
pub use eval::*;
pub use loops::*;
pub use similarity::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 读取相似度矩阵，未指定路径时使用缓存目录中的文件
fn load_matrix(
    opts: &Opts,
    path: Option<&std::path::Path>,
) -> anyhow::Result<crate::SimilarityMatrix> {
    use anyhow::Context;

    let path = path.map(|p| p.to_path_buf()).unwrap_or_else(|| opts.cache_dir.similarity());
    log::debug!("读取相似度矩阵 {}", path.display());
    crate::SimilarityMatrix::load_txt(&path)
        .with_context(|| format!("无法读取相似度矩阵 {}", path.display()))
}
