//! DeepSeek（默认后端）与按配置选择 LLM
//!
//! DeepSeek 提供与 OpenAI 完全兼容的 API 接口。
//! - Base URL: https://api.deepseek.com
//! - 模型: deepseek-chat (常规对话), deepseek-reasoner (思考模式)

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};

pub use crate::config::DEFAULT_BASE_URL as DEEPSEEK_BASE_URL;

/// 根据配置与环境变量选择 LLM 后端；没有 API Key 时退回 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    match cfg.llm.resolved_api_key() {
        Some(key) => {
            let base = cfg.llm.resolved_base_url();
            let model = cfg.llm.resolved_model();
            tracing::info!(base_url = %base, model = %model, "Using OpenAI-compatible LLM");
            Arc::new(
                OpenAiClient::new(Some(&base), &model, &key, cfg.llm.resolved_max_tokens())
                    .with_request_timeout(cfg.llm.request_timeout_secs),
            )
        }
        None => {
            tracing::warn!("No OPENAI_API_KEY set, using Mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}
