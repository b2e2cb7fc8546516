//! 对话历史
//!
//! 每条消息在构造时即确定角色（System / User / Assistant / ToolResult）与分段内容（文本、工具调用、工具返回），
//! 之后不再根据内容推断角色。ConversationHistory 保证：若存在 system 消息，只有一条且位于首位。

use serde::{Deserialize, Serialize};

use crate::react::planner::ToolCall;

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

/// 消息分段
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePart {
    Text { text: String },
    /// 模型发起的工具调用（未完成时即「在途调用」）
    ToolCall(ToolCall),
    /// 工具返回，call_id 与对应 ToolCall.id 配对
    ToolReturn {
        call_id: String,
        tool: String,
        content: String,
    },
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![MessagePart::Text {
                text: content.into(),
            }],
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// 模型发起的工具调用
    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![MessagePart::ToolCall(call)],
        }
    }

    /// 工具执行结果
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            role: Role::ToolResult,
            parts: vec![MessagePart::ToolReturn {
                call_id: call.id.clone(),
                tool: call.tool.clone(),
                content: content.into(),
            }],
        }
    }

    /// 所有文本分段拼接（不含工具调用 / 返回）
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 本条消息携带的工具调用
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.parts.iter().filter_map(|p| match p {
            MessagePart::ToolCall(c) => Some(c),
            _ => None,
        })
    }
}

/// 对话历史：由编排器持有，重置操作只借用可变引用
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以 system 指令开头的历史
    pub fn with_system(instructions: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(instructions)],
        }
    }

    /// 追加消息；非首位的 system 消息会被拒绝
    pub fn push(&mut self, msg: Message) {
        if msg.role == Role::System && !self.messages.is_empty() {
            tracing::warn!("dropping system message appended after conversation start");
            return;
        }
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 整体替换历史（仅供重置等截断操作使用）
    pub(crate) fn replace(&mut self, messages: Vec<Message>) {
        debug_assert!(messages
            .iter()
            .skip(1)
            .all(|m| m.role != Role::System));
        self.messages = messages;
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for ConversationHistory {
    fn from(messages: Vec<Message>) -> Self {
        let mut history = Self::new();
        for m in messages {
            history.push(m);
        }
        history
    }
}
