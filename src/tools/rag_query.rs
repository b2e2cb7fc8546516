//! 知识库检索工具（query_rag_system）
//!
//! 调用索引得到带局部编号的回答，再交给 CitationTracker 记录首个来源并改写为全局编号。
//! 检索失败或索引不可用时返回 "Error querying RAG system: ..." 文本，不中断对话。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::rag::IndexHandle;
use crate::session::CitationTracker;
use crate::tools::schema::args_schema;
use crate::tools::{Tool, ToolContext, ToolOutput};

pub const QUERY_RAG_SYSTEM: &str = "query_rag_system";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryArgs {
    /// 针对知识库的具体问题
    pub query: String,
}

/// query_rag_system 工具
pub struct QueryRagSystemTool {
    index: IndexHandle,
    tracker: CitationTracker,
}

impl QueryRagSystemTool {
    pub fn new(index: IndexHandle, tracker: CitationTracker) -> Self {
        Self { index, tracker }
    }
}

#[async_trait]
impl Tool for QueryRagSystemTool {
    fn name(&self) -> &str {
        QUERY_RAG_SYSTEM
    }

    fn description(&self) -> &str {
        "Retrieve information from the procurement knowledge base. Provide a specific query; \
         can be called multiple times. The output includes in-line citations in the format [id]."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<QueryArgs>()
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, args: Value) -> Result<ToolOutput, String> {
        let args: QueryArgs =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;

        let retriever = match &self.index {
            IndexHandle::Ready(r) => r,
            IndexHandle::Unavailable(reason) => {
                return Ok(ToolOutput::text(format!(
                    "Error querying RAG system: knowledge base index is unavailable ({reason})"
                )));
            }
        };

        match retriever.query(&args.query).await {
            Ok(response) => {
                let (text, number) = self.tracker.cite_response(ctx.state, &response);
                match number {
                    Some(n) => {
                        tracing::info!(citation = n, sources = response.source_nodes.len(), "rag query cited");
                        Ok(ToolOutput::with_snapshot(text, ctx.state.snapshot()))
                    }
                    None => Ok(ToolOutput::text(text)),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "rag query failed");
                Ok(ToolOutput::text(format!("Error querying RAG system: {e}")))
            }
        }
    }
}
