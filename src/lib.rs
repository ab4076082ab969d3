pub mod candidate;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod groundtruth;
pub mod similarity;
pub mod utils;

pub use candidate::{Candidate, select_best_excluding_window, select_top_k};
pub use config::{MatchConfig, Opts};
pub use descriptor::{DescriptorExtractor, DescriptorSet, ImageSequence};
pub use error::LoopError;
pub use similarity::SimilarityMatrix;
