use thiserror::Error;

#[derive(Debug, Error)]
pub enum RangeError {
    /// First parse error found in the query tree
    #[error("{0}")]
    Parse(String),

    #[error("evaluation exceeded maximum depth of {0}")]
    DepthExceeded(usize),

    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, RangeError>;
