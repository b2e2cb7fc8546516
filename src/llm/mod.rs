//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）与嵌入

pub mod deepseek;
pub mod embedding;
pub mod mock;
pub mod openai;
pub mod traits;

pub use deepseek::{create_llm_from_config, DEEPSEEK_BASE_URL};
pub use embedding::{create_embedder_from_config, EmbeddingProvider, OpenAiEmbedder};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;
