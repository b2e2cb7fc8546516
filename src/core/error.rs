//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 RetryWithPrompt / AskUser / Abort。
//! 工具层可恢复的失败（文件不存在、检索失败、重置无锚点）不走这里，而是以字符串结果返回给模型。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Context window exceeded")]
    ContextWindowExceeded,

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    /// 配置要求索引必须可用，但启动时加载失败
    #[error("Document index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Cancelled")]
    Cancelled,
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让 LLM 重试（如 JSON 格式错误、调用不存在的工具）
    RetryWithPrompt(String),
    /// 需要用户决策
    AskUser(String),
    /// 终止当前轮次
    Abort,
}
