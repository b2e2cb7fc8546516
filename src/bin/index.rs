//! 构建知识库索引
//!
//! 用法: procure-index [DATA_DIR] [STORAGE_DIR]
//! 遍历 DATA_DIR（默认 data）下的 .md / .txt 文件，分块、嵌入后写入 STORAGE_DIR/docstore.json（默认 DATA_DIR/storage）。

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use procure::config::load_config;
use procure::llm::create_embedder_from_config;
use procure::rag::{Chunker, ChunkingConfig, VectorStore};

fn is_indexable(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("txt")
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    procure::observability::init();

    let mut args = std::env::args().skip(1);
    let data_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data"));
    let storage_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("storage"));

    let cfg = load_config(None).context("Failed to load configuration")?;
    let Some(embedder) = create_embedder_from_config(&cfg) else {
        bail!("no embedding API key configured (set EMBEDDING_API_KEY or OPENAI_API_KEY)");
    };

    let chunker = Chunker::new(ChunkingConfig::default());
    let mut store = VectorStore::new();
    let mut files = 0usize;

    for entry in walkdir::WalkDir::new(&data_dir)
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_indexable(path) || path.starts_with(&storage_dir) {
            continue;
        }

        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let doc_id = path
            .strip_prefix(&data_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();

        let chunks: Vec<_> = chunker
            .chunk(&doc_id, &text)
            .into_iter()
            .map(|c| c.with_metadata("file_name", file_name.clone()))
            .collect();
        let total = chunks.len();
        let added = store.add_chunks(embedder.as_ref(), chunks).await;
        tracing::info!(file = %doc_id, chunks = total, embedded = added, "indexed");
        files += 1;
    }

    if store.is_empty() {
        bail!("no .md or .txt content indexed under {}", data_dir.display());
    }

    store
        .save(&storage_dir)
        .with_context(|| format!("Failed to write index to {}", storage_dir.display()))?;
    tracing::info!(
        files,
        chunks = store.len(),
        dir = %storage_dir.display(),
        "index written"
    );
    Ok(())
}
