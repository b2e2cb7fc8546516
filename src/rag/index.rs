//! 索引加载
//!
//! 进程启动时执行一次：在候选存储目录中找到含 docstore.json 的第一个目录并加载，
//! 得到只读的 IndexHandle，之后由多个对话并发读取。加载失败不会 panic，而是得到 Unavailable。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{EmbeddingProvider, LlmClient};
use crate::rag::{CitationQueryEngine, Retriever, VectorStore, DOCSTORE_FILE};

/// 启动时得到的索引句柄
#[derive(Clone)]
pub enum IndexHandle {
    Ready(Arc<dyn Retriever>),
    /// 不可用的原因（用于日志与工具返回）
    Unavailable(String),
}

impl IndexHandle {
    pub fn is_ready(&self) -> bool {
        matches!(self, IndexHandle::Ready(_))
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexHandle::Ready(_) => f.write_str("IndexHandle::Ready"),
            IndexHandle::Unavailable(reason) => write!(f, "IndexHandle::Unavailable({})", reason),
        }
    }
}

/// 默认存储目录候选：项目根下 agent/data/storage、当前目录 data/storage、crate 目录 data/storage
pub fn default_storage_dirs() -> Vec<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    vec![
        cwd.join("agent").join("data").join("storage"),
        cwd.join("data").join("storage"),
        Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join("storage"),
    ]
}

/// 返回第一个包含 docstore.json 的目录
pub fn find_storage_dir(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|dir| dir.join(DOCSTORE_FILE).is_file())
        .cloned()
}

/// 按配置加载索引；嵌入不可用、目录不存在或文件损坏都返回 Unavailable
pub fn load_index(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
) -> IndexHandle {
    let candidates = if cfg.rag.storage_dirs.is_empty() {
        default_storage_dirs()
    } else {
        cfg.rag.storage_dirs.clone()
    };

    let Some(dir) = find_storage_dir(&candidates) else {
        tracing::warn!(?candidates, "RAG storage directory not found in checked paths");
        return IndexHandle::Unavailable("storage directory not found".to_string());
    };
    let Some(embedder) = embedder else {
        tracing::warn!("RAG index not loaded: no embedding provider configured");
        return IndexHandle::Unavailable("no embedding provider configured".to_string());
    };

    tracing::info!(dir = %dir.display(), "Loading index");
    match VectorStore::load(&dir) {
        Ok(store) => {
            tracing::info!(dir = %dir.display(), chunks = store.len(), "Finished loading index");
            IndexHandle::Ready(Arc::new(CitationQueryEngine::new(
                store,
                embedder,
                llm,
                cfg.rag.resolved_top_k(),
            )))
        }
        Err(e) => {
            tracing::error!(dir = %dir.display(), error = %e, "Failed to load index");
            IndexHandle::Unavailable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::rag::Chunk;

    #[test]
    fn test_find_storage_dir_requires_docstore() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty");
        std::fs::create_dir_all(&empty).unwrap();
        let good = tmp.path().join("good");
        let mut store = VectorStore::new();
        store.add(Chunk::new("a", "x", "d"), vec![1.0]).unwrap();
        store.save(&good).unwrap();

        let found = find_storage_dir(&[tmp.path().join("missing"), empty, good.clone()]);
        assert_eq!(found, Some(good));
    }

    #[test]
    fn test_load_index_unavailable_without_storage() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.rag.storage_dirs = vec![tmp.path().join("nope")];

        let handle = load_index(&cfg, Arc::new(MockLlmClient), None);
        assert!(!handle.is_ready());
        assert!(matches!(handle, IndexHandle::Unavailable(ref r) if r.contains("not found")));
    }

    #[test]
    fn test_load_index_unavailable_on_corrupt_docstore() {
        struct ZeroEmbedder;
        #[async_trait::async_trait]
        impl EmbeddingProvider for ZeroEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>, String> {
                Ok(vec![0.0])
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(DOCSTORE_FILE), "not json").unwrap();
        let mut cfg = AppConfig::default();
        cfg.rag.storage_dirs = vec![tmp.path().to_path_buf()];

        let handle = load_index(&cfg, Arc::new(MockLlmClient), Some(Arc::new(ZeroEmbedder)));
        assert!(!handle.is_ready());
    }
}
