use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database not opened")]
    NotOpened,

    #[error("{detail}: index has {index_rows} rows, ledger has {keys} keys")]
    Consistency {
        index_rows: usize,
        keys: usize,
        detail: String,
    },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("vector component {component} is not finite")]
    NonFinite { component: usize },

    #[error("position {position} out of range for store of length {len}")]
    PositionOutOfRange { position: usize, len: usize },

    #[error("store corrupt: {0}")]
    Corrupt(String),

    #[error("cannot create store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("embedding failed for {input:?}: {source:#}")]
    Embedding {
        input: String,
        #[source]
        source: anyhow::Error,
    },
}

impl StoreError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// True for errors that mean the on-disk state cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Consistency { .. } | Self::Corrupt(_) | Self::Codec(_)
        )
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
