use thiserror::Error;

#[derive(Debug, Error)]
pub enum TocError {
    #[error("revision retrieval failed: {0}")]
    RetrievalFailure(String),
    #[error("page not found: {0}")]
    PageNotFound(String),
    #[error("no usable snapshots for page `{page}`")]
    NoUsableSnapshots { page: String },
    #[error("config invalid or unreadable: {0}")]
    InvalidConfig(String),
}
