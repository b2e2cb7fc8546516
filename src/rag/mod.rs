//! 检索层：分块与向量存储、索引加载、带引用的查询

pub mod error;
pub mod index;
pub mod prompts;
pub mod query;
pub mod store;

pub use error::RagError;
pub use index::{default_storage_dirs, find_storage_dir, load_index, IndexHandle};
pub use prompts::CITATION_SYSTEM_PROMPT;
pub use query::{CitationQueryEngine, RetrievalResponse, Retriever, SourceNode};
pub use store::{Chunk, Chunker, ChunkingConfig, RetrievalHit, VectorStore, DOCSTORE_FILE};
