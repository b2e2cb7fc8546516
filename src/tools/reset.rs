//! 对话重置工具（reset_conversation）

use async_trait::async_trait;
use serde_json::Value;

use crate::session::{reset_conversation, ResetOutcome};
use crate::tools::{Tool, ToolContext, ToolOutput};

pub const RESET_CONVERSATION: &str = "reset_conversation";

/// reset_conversation 工具：截断历史到「system + 当前请求 + 本次调用」，并清空引用
pub struct ResetConversationTool;

#[async_trait]
impl Tool for ResetConversationTool {
    fn name(&self) -> &str {
        RESET_CONVERSATION
    }

    fn description(&self) -> &str {
        "Clear previous conversation context when the user starts a new, unrelated procurement request. \
         Call it first, before any other tool, for that request. No arguments."
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, _args: Value) -> Result<ToolOutput, String> {
        let outcome = reset_conversation(ctx.history, ctx.state);
        Ok(match outcome {
            ResetOutcome::Reset { .. } => {
                ToolOutput::with_snapshot(outcome.status_message(), ctx.state.snapshot())
            }
            ResetOutcome::Unchanged => ToolOutput::text(outcome.status_message()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ConversationHistory, Message};
    use crate::react::planner::ToolCall;
    use crate::session::reset::{RESET_OK_MESSAGE, RESET_UNABLE_MESSAGE};
    use crate::session::SessionState;

    #[tokio::test]
    async fn test_reset_tool_success_pushes_snapshot() {
        let mut history = ConversationHistory::from(vec![
            Message::system("sys"),
            Message::user("old"),
            Message::assistant("old answer"),
            Message::user("new"),
            Message::tool_call(ToolCall::new(RESET_CONVERSATION, serde_json::json!({}))),
        ]);
        let mut state = SessionState::new();
        state.citation_sources.push("stale".into());
        state.save_code("A1", "kept");
        let mut ctx = ToolContext::new(&mut state, &mut history);

        let out = ResetConversationTool
            .execute(&mut ctx, Value::Null)
            .await
            .unwrap();

        assert_eq!(out.content, RESET_OK_MESSAGE);
        let snap = out.snapshot.unwrap();
        assert!(snap.snapshot.citation_sources.is_empty());
        assert_eq!(snap.snapshot.procurement_codes.len(), 1);
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_reset_tool_noop() {
        let mut history = ConversationHistory::from(vec![Message::system("sys")]);
        let mut state = SessionState::new();
        let mut ctx = ToolContext::new(&mut state, &mut history);

        let out = ResetConversationTool
            .execute(&mut ctx, Value::Null)
            .await
            .unwrap();
        assert_eq!(out.content, RESET_UNABLE_MESSAGE);
        assert!(out.snapshot.is_none());
    }
}
