use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use super::candidates::print_candidates;
use crate::candidate::select_best_excluding_window;
use crate::cli::{SubCommandExtend, load_matrix};
use crate::config::{MatchConfig, MatchOptions, Opts, OutputFormat};

#[derive(Parser, Debug, Clone)]
pub struct BestCommand {
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

impl SubCommandExtend for BestCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let config = MatchConfig::from(&self.matching);
        let matrix = load_matrix(opts, self.matrix.as_deref())?;
        let best = select_best_excluding_window(&matrix, self.index, config.window_radius)?;
        match best {
            Some(c) => print_candidates(&[c], self.output_format),
            None => {
                info!("第 {} 帧前后 {} 帧之外没有候选", self.index, config.window_radius);
                match self.output_format {
                    OutputFormat::Json => println!("null"),
                    OutputFormat::Table => println!("none"),
                }
                Ok(())
            }
        }
    }
}
