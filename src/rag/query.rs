//! 带引用的检索查询
//!
//! 检索前 top_k 个块，按排名编号为 `Source {i} ({file_name}):`，再让 LLM 按 [id] 格式合成回答。
//! 这里的编号只在单次调用内有效，全局编号由 session::CitationTracker 负责改写。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{EmbeddingProvider, LlmClient};
use crate::memory::Message;
use crate::rag::prompts::render_citation_prompt;
use crate::rag::{RagError, RetrievalHit, VectorStore};

/// 无检索结果时的回答文本
pub const EMPTY_RESPONSE: &str = "Empty Response";
const UNKNOWN_SOURCE: &str = "Unknown Source";

/// 参与回答的来源块（按排名排序）
#[derive(Debug, Clone, PartialEq)]
pub struct SourceNode {
    pub text: String,
    pub file_name: Option<String>,
    pub score: f32,
}

/// 一次检索调用的结果
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResponse {
    pub text: String,
    pub source_nodes: Vec<SourceNode>,
}

/// 检索能力（外部协作者的窄接口）
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn query(&self, query: &str) -> Result<RetrievalResponse, RagError>;
}

/// 给检索到的块加上来源标签，拼成合成提示的 context
pub fn label_sources(hits: &[RetrievalHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "Source {} ({}):\n{}\n",
                i + 1,
                hit.chunk.file_name().unwrap_or(UNKNOWN_SOURCE),
                hit.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 基于 VectorStore 的引用查询引擎
pub struct CitationQueryEngine {
    store: VectorStore,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmClient>,
    top_k: usize,
}

impl CitationQueryEngine {
    pub fn new(
        store: VectorStore,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            top_k,
        }
    }
}

#[async_trait]
impl Retriever for CitationQueryEngine {
    async fn query(&self, query: &str) -> Result<RetrievalResponse, RagError> {
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(RagError::Embedding)?;
        let hits = self.store.search(&query_embedding, self.top_k);
        tracing::debug!(query = %query, hits = hits.len(), "retrieval");

        if hits.is_empty() {
            return Ok(RetrievalResponse {
                text: EMPTY_RESPONSE.to_string(),
                source_nodes: Vec::new(),
            });
        }

        let prompt = render_citation_prompt(&label_sources(&hits), query);
        let text = self
            .llm
            .complete(&[Message::user(prompt)])
            .await
            .map_err(RagError::Synthesis)?;

        Ok(RetrievalResponse {
            text,
            source_nodes: hits
                .into_iter()
                .map(|h| SourceNode {
                    file_name: h.chunk.file_name().map(String::from),
                    text: h.chunk.text,
                    score: h.score,
                })
                .collect(),
        })
    }
}
