use thiserror::Error;

/// 检索层错误
#[derive(Error, Debug)]
pub enum RagError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("answer synthesis failed: {0}")]
    Synthesis(String),

    #[error("knowledge base index is unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("docstore format error: {0}")]
    Serde(#[from] serde_json::Error),
}
