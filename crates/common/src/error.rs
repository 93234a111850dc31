use thiserror::Error;

use crate::{JobKind, ProductId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing external data for product {product_id}: {detail}")]
    MissingExternalData { product_id: ProductId, detail: String },

    #[error("insufficient history")]
    InsufficientHistory,

    #[error("invalid rule config: {0}")]
    InvalidRuleConfig(String),

    #[error("storage write failed: {0}")]
    WriteFailure(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} job is already running")]
    JobAlreadyRunning(JobKind),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn missing(product_id: ProductId, detail: impl Into<String>) -> Self {
        Error::MissingExternalData {
            product_id,
            detail: detail.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
