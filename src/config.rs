use std::convert::Infallible;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;

static CACHE_DIR: LazyLock<String> = LazyLock::new(|| {
    ProjectDirs::from("", "loopsim", "loopsim")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".loopsim"))
        .to_string_lossy()
        .into_owned()
});

fn default_cache_dir() -> &'static str {
    CACHE_DIR.as_str()
}

/// 相似度矩阵构建与候选筛选的参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    /// 期望的描述符维度，为 None 时只检查查询集和数据库一致
    pub dim: Option<usize>,
    /// 查询序列和数据库是否为同一条轨迹，是则把 j > i 的项置零
    pub causal_mask: bool,
    /// 每个查询保留的最大候选数量
    pub top_k: usize,
    /// 最低相似度
    pub threshold: f32,
    /// 查询帧前后被排除的帧数
    pub window_radius: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self { dim: None, causal_mask: true, top_k: 10, threshold: 0.8, window_radius: 15 }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct MatchOptions {
    /// 描述符维度，0 表示不检查
    #[arg(long, value_name = "D", default_value_t = 4096)]
    pub dim: usize,
    /// 不使用因果掩码，查询和数据库来自不同轨迹时使用
    #[arg(long)]
    pub no_causal_mask: bool,
    /// 每个查询保留的最大候选数量
    #[arg(short, value_name = "K", default_value_t = 10)]
    pub k: usize,
    /// 最低相似度，低于该值的候选会被过滤
    #[arg(short, long, value_name = "SCORE", default_value_t = 0.8)]
    pub threshold: f32,
    /// 查询帧附近被排除的帧数
    #[arg(short, long, value_name = "N", default_value_t = 15)]
    pub window: usize,
}

impl From<&MatchOptions> for MatchConfig {
    fn from(opts: &MatchOptions) -> Self {
        Self {
            dim: (opts.dim != 0).then_some(opts.dim),
            causal_mask: !opts.no_causal_mask,
            top_k: opts.k,
            threshold: opts.threshold,
            window_radius: opts.window,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "loopsim", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 描述符和相似度矩阵的缓存目录
    #[arg(short, long, default_value = default_cache_dir())]
    pub cache_dir: CacheDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 根据描述符缓存计算相似度矩阵
    Similarity(SimilarityCommand),
    /// 列出某一帧的回环候选
    Candidates(CandidatesCommand),
    /// 查找某一帧在邻域之外最相似的帧
    Best(BestCommand),
    /// 使用真值评估回环候选
    Eval(EvalCommand),
    /// 查看真值中的回环
    Loops(LoopsCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Database,
    Query,
}

impl Split {
    pub fn name(&self) -> &'static str {
        match self {
            Split::Database => "db",
            Split::Query => "query",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheDir {
    path: PathBuf,
}

impl CacheDir {
    /// 返回描述符缓存文件的路径
    pub fn descriptors(&self, split: Split) -> PathBuf {
        self.path.join(format!("global_descriptors_{}.npy", split.name()))
    }

    /// 返回相似度矩阵缓存文件的路径
    pub fn similarity(&self) -> PathBuf {
        self.path.join("similarity_matrix.txt")
    }

    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.path)
    }
}

impl FromStr for CacheDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}
