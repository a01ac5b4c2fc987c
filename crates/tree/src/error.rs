use crate::mutation::Root;
use thiserror::Error;

/// Misuse of the index-based editing API. Mutation processing itself never
/// fails; unresolvable inputs are skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("splice out of bounds: index {index} + delete {delete_count} exceeds length {len}")]
    SpliceOutOfBounds {
        index: usize,
        delete_count: usize,
        len: usize,
    },
    #[error("{root:?} row {index} out of bounds (length {len})")]
    RowOutOfBounds { root: Root, index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid tree config: {0}")]
    Toml(#[from] toml::de::Error),
}
