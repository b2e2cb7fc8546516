//! Planner：调用 LLM 与 Tool Call 解析
//!
//! 调用 LLM 得到回复或 JSON Tool Call；parse_llm_output 从文本中提取 JSON 并解析为 ToolCall 或直接回复。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::openai::render_message_text;
use crate::llm::LlmClient;
use crate::memory::Message;

fn new_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

fn empty_args() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// LLM 返回的 Tool Call（{"tool": "query_rag_system", "args": {"query": "..."}}）；id 由本地生成
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default = "new_call_id")]
    pub id: String,
    pub tool: String,
    #[serde(default = "empty_args")]
    pub args: serde_json::Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: new_call_id(),
            tool: tool.into(),
            args,
        }
    }
}

/// Planner 输出
#[derive(Debug, Clone)]
pub enum PlannerOutput {
    /// 直接回复用户
    Response(String),
    /// 需要执行工具
    ToolCall(ToolCall),
}

/// 解析 LLM 输出：若含有效 JSON 且 tool 非空则为 ToolCall，否则为 Response
pub fn parse_llm_output(output: &str) -> Result<PlannerOutput, AgentError> {
    let trimmed = output.trim();

    // 提取 JSON 块（```json ... ``` 或以 { 开头的输出）；以 { 开头但被截断的输出按解析失败处理，
    // 正文里夹着花括号的普通回答不当作工具调用
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if trimmed.starts_with('{') {
        trimmed
    } else {
        return Ok(PlannerOutput::Response(trimmed.to_string()));
    };

    let parsed: ToolCall = serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))?;

    if parsed.tool.is_empty() {
        Ok(PlannerOutput::Response(trimmed.to_string()))
    } else {
        Ok(PlannerOutput::ToolCall(parsed))
    }
}

/// 粗略 token 估算（约 4 字符 / token）
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| render_message_text(m).chars().count() / 4 + 4)
        .sum()
}

/// Planner：持有 LLM 与上下文窗口上限
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    context_window: usize,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, context_window: usize) -> Self {
        Self {
            llm,
            context_window,
        }
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// 历史中已含 system 指令，直接发送；估算超出上下文窗口时不调用 LLM
    pub async fn plan(&self, messages: &[Message]) -> Result<String, AgentError> {
        if estimate_tokens(messages) > self.context_window {
            return Err(AgentError::ContextWindowExceeded);
        }
        self.llm
            .complete(messages)
            .await
            .map_err(AgentError::LlmError)
    }
}
