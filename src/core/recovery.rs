//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供主循环决定是重试、询问用户还是终止。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// available_tools 用于在幻觉工具时提示模型可用的工具名
    pub fn handle(&self, err: &AgentError, available_tools: &[String]) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous output was not valid tool-call JSON: {raw}. \
                When calling a tool, output exactly one JSON object and nothing else, \
                in the form {{\"tool\": \"tool_name\", \"args\": {{...}}}}. \
                Otherwise answer the user in plain text."
            )),
            AgentError::HallucinatedTool(name) => {
                let mut names = available_tools.to_vec();
                names.sort();
                RecoveryAction::RetryWithPrompt(format!(
                    "Tool '{name}' does not exist. Available tools: {}.",
                    names.join(", ")
                ))
            }
            AgentError::ContextWindowExceeded => RecoveryAction::AskUser(
                "The conversation is too long. Please start a new request.".to_string(),
            ),
            AgentError::ToolTimeout(tool) => {
                RecoveryAction::AskUser(format!("Tool '{tool}' timed out. Retry?"))
            }
            AgentError::ToolExecutionFailed(msg) => {
                RecoveryAction::AskUser(format!("Tool execution failed: {msg}"))
            }
            AgentError::Cancelled => RecoveryAction::Abort,
            _ => RecoveryAction::Abort,
        }
    }
}
