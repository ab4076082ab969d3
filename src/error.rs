use std::path::PathBuf;

/// 相似度矩阵与回环候选相关的错误
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("descriptor dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("empty input: no {0} descriptors")]
    EmptyInput(&'static str),

    #[error("corrupt cache file {path}: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("ground truth must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("invalid image sequence: {0}")]
    InvalidSequence(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error(transparent)]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),
}

pub type Result<T, E = LoopError> = std::result::Result<T, E>;

impl LoopError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CacheCorrupt { path: path.into(), reason: reason.into() }
    }
}
