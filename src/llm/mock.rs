//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! - MockLlmClient：先用最后一条 user 消息调用 query_rag_system，拿到 Observation 后原样作为回复。
//! - ScriptedLlmClient：按顺序返回预设回复，并记录每次收到的消息，供测试断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, MessagePart, Role};

/// Mock 客户端：一次检索后回显检索结果
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Some(last) = messages.last().filter(|m| m.role == Role::ToolResult) {
            let observation = last
                .parts
                .iter()
                .find_map(|p| match p {
                    MessagePart::ToolReturn { content, .. } => Some(content.as_str()),
                    _ => None,
                })
                .unwrap_or("(no result)");
            return Ok(format!("Mock answer: {}", observation));
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text_content())
            .unwrap_or_else(|| "(no input)".to_string());

        Ok(serde_json::json!({
            "tool": "query_rag_system",
            "args": { "query": last_user },
        })
        .to_string())
    }
}

/// 脚本化客户端：依次返回 responses；用完后返回错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<String>>,
    received: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            received: Mutex::new(Vec::new()),
        }
    }

    /// 每次 complete 收到的完整消息列表
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut received) = self.received.lock() {
            received.push(messages.to_vec());
        }
        self.responses
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front()
            .ok_or_else(|| "scripted responses exhausted".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::react::planner::ToolCall;

    #[tokio::test]
    async fn test_mock_queries_then_answers() {
        let llm = MockLlmClient;
        let first = llm.complete(&[Message::user("steel beam")]).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(v["tool"], "query_rag_system");
        assert_eq!(v["args"]["query"], "steel beam");

        let call = ToolCall::new("query_rag_system", serde_json::json!({}));
        let second = llm
            .complete(&[Message::user("steel beam"), Message::tool_result(&call, "code T [1]")])
            .await
            .unwrap();
        assert_eq!(second, "Mock answer: code T [1]");
    }

    #[tokio::test]
    async fn test_scripted_in_order() {
        let llm = ScriptedLlmClient::new(["a", "b"]);
        assert_eq!(llm.complete(&[]).await.unwrap(), "a");
        assert_eq!(llm.complete(&[Message::user("x")]).await.unwrap(), "b");
        assert!(llm.complete(&[]).await.is_err());
        assert_eq!(llm.received().len(), 3);
        assert_eq!(llm.remaining(), 0);
    }
}
