use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde_json::json;
use tokio::task::block_in_place;

use crate::cli::{SubCommandExtend, load_matrix};
use crate::config::{MatchConfig, MatchOptions, Opts, OutputFormat};
use crate::groundtruth::{GroundTruth, evaluate};

#[derive(Parser, Debug, Clone)]
pub struct EvalCommand {
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 真值文件，N×N 的 npy 矩阵
    pub ground_truth: PathBuf,
    /// 相似度矩阵文件，默认使用缓存目录中的 similarity_matrix.txt
    #[arg(short, long, value_name = "FILE")]
    pub matrix: Option<PathBuf>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for EvalCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let config = MatchConfig::from(&self.matching);
        let gt = GroundTruth::load_npy(&self.ground_truth)
            .with_context(|| format!("无法读取真值 {}", self.ground_truth.display()))?;
        let matrix = load_matrix(opts, self.matrix.as_deref())?;

        info!("评估 {} 帧，top-k = {}，阈值 = {}", matrix.num_query(), config.top_k, config.threshold);
        let report = block_in_place(|| evaluate(&matrix, &gt, &config))?;

        match self.output_format {
            OutputFormat::Json => {
                let value = json!({
                    "report": report,
                    "precision": report.precision(),
                    "recall": report.recall(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            OutputFormat::Table => {
                println!("queries\t{}", report.queries);
                println!("detected\t{}", report.detected);
                println!("true_positives\t{}", report.true_positives);
                println!("false_positives\t{}", report.false_positives);
                println!("false_negatives\t{}", report.false_negatives);
                println!("precision\t{:.4}", report.precision());
                println!("recall\t{:.4}", report.recall());
            }
        }
        Ok(())
    }
}
