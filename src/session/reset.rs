//! 对话重置
//!
//! 新的、无关的请求不应继承旧上下文。截断后历史形如 `[system?, 锚点 user, 在途工具调用]`：
//! - 最后一条是触发本次重置的工具调用，必须保留，否则调用无法配对；
//! - 锚点是最后一条之前最近的 user 消息，按角色查找（中间可能夹着 tool_result）；
//! - 找不到锚点时不做任何修改，返回 NoAnchorUserTurn。
//!
//! 成功重置会清空 citation_sources，开始新的引用纪元；失败时引用保持不变。

use thiserror::Error;

use crate::memory::{ConversationHistory, Message, Role};
use crate::session::SessionState;

pub const RESET_OK_MESSAGE: &str =
    "Conversation reset. Previous context and citations were cleared; continue with the new request only.";
pub const RESET_UNABLE_MESSAGE: &str =
    "Unable to isolate the new request: no user message precedes the current tool call. Conversation left unchanged.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResetError {
    #[error("no user turn found before the in-flight tool call")]
    NoAnchorUserTurn,
}

/// 重置结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// 已截断；kept 为保留的消息条数
    Reset { kept: usize },
    /// 未找到锚点，历史与引用均未修改
    Unchanged,
}

impl ResetOutcome {
    /// 返回给模型的状态文本
    pub fn status_message(&self) -> &'static str {
        match self {
            ResetOutcome::Reset { .. } => RESET_OK_MESSAGE,
            ResetOutcome::Unchanged => RESET_UNABLE_MESSAGE,
        }
    }
}

/// 计算截断后的历史，不修改输入
pub fn isolate_latest_request(history: &[Message]) -> Result<Vec<Message>, ResetError> {
    let (last, earlier) = history.split_last().ok_or(ResetError::NoAnchorUserTurn)?;

    let anchor = earlier
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .ok_or(ResetError::NoAnchorUserTurn)?;

    let mut kept = Vec::with_capacity(3);
    if let Some(first) = earlier.first().filter(|m| m.role == Role::System) {
        kept.push(first.clone());
    }
    kept.push(anchor.clone());
    kept.push(last.clone());
    Ok(kept)
}

/// 对编排器持有的历史执行重置，并在成功时开启新的引用纪元
pub fn reset_conversation(
    history: &mut ConversationHistory,
    state: &mut SessionState,
) -> ResetOutcome {
    match isolate_latest_request(history.messages()) {
        Ok(kept) => {
            let dropped = history.len() - kept.len();
            let kept_len = kept.len();
            history.replace(kept);
            state.citation_sources.clear();
            tracing::info!(dropped, kept = kept_len, "conversation reset");
            ResetOutcome::Reset { kept: kept_len }
        }
        Err(e) => {
            tracing::warn!(error = %e, len = history.len(), "conversation reset skipped");
            ResetOutcome::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::react::planner::ToolCall;

    fn reset_call() -> Message {
        Message::tool_call(ToolCall::new("reset_conversation", serde_json::json!({})))
    }

    #[test]
    fn test_reset_keeps_system_anchor_and_call() {
        let call = ToolCall::new("query_rag_system", serde_json::json!({"query": "beams"}));
        let last = reset_call();
        let mut history = ConversationHistory::from(vec![
            Message::system("sys"),
            Message::user("user A"),
            Message::tool_result(&call, "old result"),
            last.clone(),
        ]);
        let mut state = SessionState::new();
        state.citation_sources.push("old".into());

        let outcome = reset_conversation(&mut history, &mut state);

        assert_eq!(outcome, ResetOutcome::Reset { kept: 3 });
        assert_eq!(
            history.messages(),
            &[Message::system("sys"), Message::user("user A"), last]
        );
        assert!(state.citation_sources.is_empty());
    }

    #[test]
    fn test_reset_picks_nearest_user_turn() {
        let call = ToolCall::new("read_code_generation_file", serde_json::json!({}));
        let history = vec![
            Message::system("sys"),
            Message::user("make a code for steel"),
            Message::assistant("CFR01067261"),
            Message::user("now something unrelated"),
            Message::tool_call(call.clone()),
            Message::tool_result(&call, "template"),
            reset_call(),
        ];
        let kept = isolate_latest_request(&history).unwrap();
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[1], Message::user("now something unrelated"));
    }

    #[test]
    fn test_reset_without_system_turn() {
        let last = reset_call();
        let history = vec![
            Message::user("old"),
            Message::assistant("answer"),
            Message::user("new"),
            last.clone(),
        ];
        let kept = isolate_latest_request(&history).unwrap();
        assert_eq!(kept, vec![Message::user("new"), last]);
    }

    #[test]
    fn test_reset_noop_is_idempotent() {
        let mut history =
            ConversationHistory::from(vec![Message::system("sys"), Message::assistant("hi"), reset_call()]);
        let before = history.clone();
        let mut state = SessionState::new();
        state.citation_sources.push("kept".into());

        let first = reset_conversation(&mut history, &mut state);
        let second = reset_conversation(&mut history, &mut state);

        assert_eq!(first, ResetOutcome::Unchanged);
        assert_eq!(first.status_message(), second.status_message());
        assert_eq!(history, before);
        assert_eq!(state.citation_sources, vec!["kept".to_string()]);
    }

    #[test]
    fn test_reset_last_user_turn_is_not_its_own_anchor() {
        let history = vec![Message::system("sys"), Message::user("only")];
        assert_eq!(
            isolate_latest_request(&history),
            Err(ResetError::NoAnchorUserTurn)
        );
    }

    #[test]
    fn test_reset_empty_history() {
        let mut history = ConversationHistory::new();
        let mut state = SessionState::new();
        assert_eq!(
            reset_conversation(&mut history, &mut state),
            ResetOutcome::Unchanged
        );
        assert!(history.is_empty());
    }
}
