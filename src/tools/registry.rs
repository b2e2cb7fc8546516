//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时加超时并统一转 AgentError。
//! 工具通过 ToolContext 独占借用本对话的 SessionState 与对话历史，不持有任何共享可变状态。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::memory::ConversationHistory;
use crate::session::{SessionState, StateSnapshot};

/// 单次工具调用可访问的对话上下文
pub struct ToolContext<'a> {
    pub state: &'a mut SessionState,
    pub history: &'a mut ConversationHistory,
}

impl<'a> ToolContext<'a> {
    pub fn new(state: &'a mut SessionState, history: &'a mut ConversationHistory) -> Self {
        Self { state, history }
    }
}

/// 工具结果：返回给模型的文本，以及（若修改了状态）推送给 UI 的快照
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub snapshot: Option<StateSnapshot>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            snapshot: None,
        }
    }

    pub fn with_snapshot(content: impl Into<String>, snapshot: StateSnapshot) -> Self {
        Self {
            content: content.into(),
            snapshot: Some(snapshot),
        }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
///
/// 可恢复的失败（找不到文件、检索失败等）应作为 Ok 文本返回，让模型自行处理；
/// Err 只用于参数错误等调用本身无效的情况。
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, args: Value) -> Result<ToolOutput, String>;
}

/// 工具注册表：按名称有序存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn execute(
        &self,
        name: &str,
        ctx: &mut ToolContext<'_>,
        args: Value,
    ) -> Result<ToolOutput, String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| format!("Unknown tool: {name}"))?;
        tool.execute(ctx, args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 工具 schema JSON（name / description / parameters），拼入 system prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
