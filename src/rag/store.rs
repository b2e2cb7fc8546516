//! 文档分块与向量存储
//!
//! Chunker 按分隔符优先级切块（UTF-8 安全），VectorStore 保存 (块, 向量) 并按余弦相似度检索；
//! 存储整体序列化为 docstore.json，由 procure-index 生成、运行时只读加载。

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::llm::EmbeddingProvider;
use crate::rag::RagError;

/// 存储目录中的索引文件名
pub const DOCSTORE_FILE: &str = "docstore.json";
const DOCSTORE_VERSION: u32 = 1;

/// 文档块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source_id: String,
    /// 在原文档中的位置（字节偏移）
    pub offset: usize,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_id: source_id.into(),
            offset: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.metadata.get("file_name").map(String::as_str)
    }
}

/// 分块策略
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// 目标块大小（字符数）
    pub chunk_size: usize,
    /// 块之间的重叠（字符数）
    pub chunk_overlap: usize,
    /// 分隔符优先级（从高到低）
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                "! ".to_string(),
                "? ".to_string(),
                " ".to_string(),
            ],
        }
    }
}

/// 文档分块器
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// 将文档分割为块
    ///
    /// 在原文上按字节窗口推进：窗口取 chunk_size 个字符，未到文末时退到窗口内最后一个
    /// 高优先级分隔符之后；下一窗口从本块末尾 chunk_overlap 个字符处开始，
    /// 本块不长于重叠时直接从块尾开始。
    pub fn chunk(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let rest = &text[start..];
            let window = &rest[..byte_len_of_chars(rest, self.config.chunk_size.max(1))];
            let piece = if window.len() == rest.len() {
                window
            } else {
                &window[..self.split_point(window)]
            };

            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                let lead = piece.len() - piece.trim_start().len();
                chunks.push(
                    Chunk::new(format!("{}_{}", doc_id, chunks.len()), trimmed, doc_id)
                        .with_offset(start + lead),
                );
            }

            if piece.len() == rest.len() {
                break;
            }
            let keep = piece.chars().count().saturating_sub(self.config.chunk_overlap);
            start += if keep == 0 {
                piece.len()
            } else {
                byte_len_of_chars(piece, keep)
            };
        }

        chunks
    }

    /// 窗口内的断点（字节）：按优先级取第一个出现在非开头位置的分隔符，断在其后；都没有则整窗
    fn split_point(&self, window: &str) -> usize {
        self.config
            .separators
            .iter()
            .find_map(|sep| {
                window
                    .rfind(sep.as_str())
                    .filter(|&pos| pos > 0)
                    .map(|pos| pos + sep.len())
            })
            .unwrap_or(window.len())
    }
}

/// s 的前 n 个字符占用的字节数
fn byte_len_of_chars(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// 检索命中
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DocstoreFile {
    version: u32,
    entries: Vec<StoredEntry>,
}

/// 向量存储
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    entries: Vec<StoredEntry>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, chunk: Chunk, embedding: Vec<f32>) -> Result<(), RagError> {
        if embedding.is_empty() {
            return Err(RagError::Embedding(format!(
                "empty embedding for chunk {}",
                chunk.id
            )));
        }
        self.entries.push(StoredEntry { chunk, embedding });
        Ok(())
    }

    /// 逐块嵌入后加入存储；单块失败只记录日志，返回成功加入的数量
    pub async fn add_chunks(
        &mut self,
        embedder: &dyn EmbeddingProvider,
        chunks: Vec<Chunk>,
    ) -> usize {
        let mut added = 0;
        for chunk in chunks {
            let id = chunk.id.clone();
            let result = match embedder.embed(&chunk.text).await {
                Ok(v) => self.add(chunk, v),
                Err(e) => Err(RagError::Embedding(e)),
            };
            match result {
                Ok(()) => added += 1,
                Err(e) => tracing::warn!(chunk = %id, error = %e, "chunk skipped"),
            }
        }
        added
    }

    /// 按余弦相似度返回前 k 个命中（分数降序）
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<RetrievalHit> {
        let mut scored: Vec<(f32, &Chunk)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), &e.chunk))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| RetrievalHit {
                chunk: chunk.clone(),
                score,
            })
            .collect()
    }

    /// 从存储目录读取 docstore.json
    pub fn load(dir: &Path) -> Result<Self, RagError> {
        let raw = std::fs::read_to_string(dir.join(DOCSTORE_FILE))?;
        let file: DocstoreFile = serde_json::from_str(&raw)?;
        if file.version != DOCSTORE_VERSION {
            tracing::warn!(version = file.version, "unexpected docstore version");
        }
        Ok(Self {
            entries: file.entries,
        })
    }

    /// 写入存储目录（目录不存在时创建）
    pub fn save(&self, dir: &Path) -> Result<(), RagError> {
        std::fs::create_dir_all(dir)?;
        let file = DocstoreFile {
            version: DOCSTORE_VERSION,
            entries: self.entries.clone(),
        };
        std::fs::write(dir.join(DOCSTORE_FILE), serde_json::to_string(&file)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 余弦相似度
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
