use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, OutputFormat};
use crate::groundtruth::GroundTruth;

#[derive(Parser, Debug, Clone)]
pub struct LoopsCommand {
    /// 真值文件，N×N 的 npy 矩阵
    pub ground_truth: PathBuf,
    /// 只显示该帧的回环，否则列出每一帧的回环数量
    #[arg(short, long, value_name = "INDEX")]
    pub query: Option<usize>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for LoopsCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let gt = GroundTruth::load_npy(&self.ground_truth)
            .with_context(|| format!("无法读取真值 {}", self.ground_truth.display()))?;

        match self.query {
            Some(q) => {
                let matches = gt.matches(q)?;
                match self.output_format {
                    OutputFormat::Json => println!("{}", serde_json::to_string(&matches)?),
                    OutputFormat::Table => matches.iter().for_each(|j| println!("{j}")),
                }
            }
            None => {
                let counts = gt.loop_counts();
                match self.output_format {
                    OutputFormat::Json => println!("{}", serde_json::to_string(&counts)?),
                    OutputFormat::Table => {
                        for (i, n) in counts.iter().enumerate().filter(|(_, n)| **n > 0) {
                            println!("{i}\t{n}");
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
