//! 记忆层：对话历史（短期）

pub mod conversation;

pub use conversation::{ConversationHistory, Message, MessagePart, Role};
