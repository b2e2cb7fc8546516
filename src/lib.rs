//! Procure - 采购编码生成对话智能体
//!
//! 模块划分：
//! - **agent**: 无头 Agent 运行时（REPL 与 HTTP 共用）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与恢复
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）与嵌入
//! - **memory**: 对话历史
//! - **rag**: 分块、向量存储、索引加载与带引用的查询
//! - **react**: Planner 与主循环
//! - **session**: 会话状态、引用追踪、对话重置
//! - **tools**: 四个工具与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompts;
pub mod rag;
pub mod react;
pub mod session;
pub mod tools;

pub use agent::{
    build_agent_components, create_agent_components, process_message, process_message_stream,
    AgentComponents, Conversation,
};
