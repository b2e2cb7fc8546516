//! 过程事件：用于流式/SSE 展示工具调用、状态快照与回复

use serde::Serialize;

use crate::session::SessionState;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 步数更新（当前第几步）
    StepUpdate { step: usize, max_steps: usize },
    /// 正在调用 LLM
    Thinking,
    /// 调用工具
    ToolCall {
        call_id: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, preview: String },
    /// 工具执行失败
    ToolFailure { tool: String, reason: String },
    /// 状态变更后的完整会话状态
    StateSnapshot { snapshot: SessionState },
    /// 错误恢复动作
    Recovery { action: String, detail: String },
    /// 最终回复的一小段（流式输出）
    MessageChunk { text: String },
    /// 最终回复结束
    MessageDone,
    /// Token 使用统计（本轮增量）
    TokenUsage {
        prompt_tokens: u64,
        completion_tokens: u64,
        total_tokens: u64,
    },
    Error { text: String },
}
