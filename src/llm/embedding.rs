//! 嵌入 API：供文档索引使用，调用 OpenAI 兼容的 /embeddings 端点

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::AppConfig;

/// 嵌入提供方
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 将文本编码为向量；失败时返回错误字符串
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
}

/// 使用 async-openai 调用 OpenAI 兼容的 embeddings API
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(api_key);

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(vec![]);
        }
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| e.to_string())?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;
        Ok(response
            .data
            .first()
            .map(|e| e.embedding.clone())
            .unwrap_or_default())
    }
}

/// 从应用配置创建嵌入提供方；没有可用 Key 时返回 None
pub fn create_embedder_from_config(cfg: &AppConfig) -> Option<Arc<dyn EmbeddingProvider>> {
    let Some(key) = cfg.embedding.resolved_api_key(&cfg.llm) else {
        tracing::debug!("embedding skipped: no API key");
        return None;
    };
    let base = cfg.embedding.resolved_base_url(&cfg.llm);
    let model = cfg.embedding.resolved_model();
    tracing::info!(base_url = %base, model = %model, "Using OpenAI-compatible embeddings");
    Some(Arc::new(OpenAiEmbedder::new(&base, &model, &key)))
}
