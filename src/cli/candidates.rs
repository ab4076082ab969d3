use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::candidate::{Candidate, select_top_k};
use crate::cli::{SubCommandExtend, load_matrix};
use crate::config::{MatchConfig, MatchOptions, Opts, OutputFormat};

#[derive(Parser, Debug, Clone)]
pub struct CandidatesCommand {
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 查询帧编号
    pub index: usize,
    /// 相似度矩阵文件，默认使用缓存目录中的 similarity_matrix.txt
    #[arg(short, long, value_name = "FILE")]
    pub matrix: Option<PathBuf>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for CandidatesCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let config = MatchConfig::from(&self.matching);
        let matrix = load_matrix(opts, self.matrix.as_deref())?;
        let result = select_top_k(&matrix, self.index, config.top_k, config.threshold)?;
        if result.is_empty() {
            info!("第 {} 帧没有相似度高于 {} 的回环候选", self.index, config.threshold);
        }
        print_candidates(&result, self.output_format)
    }
}

pub(crate) fn print_candidates(result: &[Candidate], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for c in result {
                println!("{:.4}\t{}", c.score, c.index);
            }
        }
    }
    Ok(())
}
