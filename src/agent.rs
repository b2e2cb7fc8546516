//! Headless Agent 运行时
//!
//! 供 REPL 与 HTTP 前端调用的无界面 Agent 逻辑：
//! create_agent_components 在启动时构建一次 Planner / ToolExecutor / Recovery（含索引加载），之后只读共享；
//! Conversation 持有单个对话的 SessionState 与历史；
//! process_message 对单条用户输入跑主循环并返回最终回复。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{AgentError, RecoveryEngine};
use crate::llm::{create_embedder_from_config, create_llm_from_config, LlmClient};
use crate::memory::ConversationHistory;
use crate::prompts::build_system_prompt;
use crate::rag::{load_index, IndexHandle};
use crate::react::{react_loop, AgentEvent, Planner, ReactResult, ReactSession};
use crate::session::{CitationTracker, SessionState};
use crate::tools::{
    tool_call_schema_json, QueryRagSystemTool, ReadCodeGenerationFileTool, ResetConversationTool,
    SaveProcurementCodeTool, ToolExecutor, ToolRegistry,
};

/// 预构建的 Agent 组件，可多对话共享
pub struct AgentComponents {
    pub planner: Planner,
    pub executor: ToolExecutor,
    pub recovery: RecoveryEngine,
    pub max_steps: usize,
    /// 新对话的首条 system 消息
    pub system_prompt: String,
}

/// 从配置创建 Agent 组件：LLM、嵌入、索引与四个工具
///
/// rag.required 为 true 且索引不可用时返回 IndexUnavailable。
pub fn create_agent_components(cfg: &AppConfig) -> Result<AgentComponents, AgentError> {
    let llm = create_llm_from_config(cfg);
    let embedder = create_embedder_from_config(cfg);
    let index = load_index(cfg, llm.clone(), embedder);

    if let IndexHandle::Unavailable(reason) = &index {
        if cfg.rag.required {
            return Err(AgentError::IndexUnavailable(reason.clone()));
        }
        tracing::warn!(%reason, "continuing without knowledge base; query_rag_system will report errors");
    }

    Ok(build_agent_components(cfg, llm, index))
}

/// 以给定的 LLM 与索引组装组件（测试中可注入脚本化 LLM 与桩检索器）
pub fn build_agent_components(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    index: IndexHandle,
) -> AgentComponents {
    let mut tools = ToolRegistry::new();
    tools.register(ReadCodeGenerationFileTool::from_config(&cfg.reference));
    tools.register(QueryRagSystemTool::new(
        index,
        CitationTracker::new(cfg.rag.preview_chars),
    ));
    tools.register(ResetConversationTool);
    tools.register(SaveProcurementCodeTool);

    let system_prompt = build_system_prompt(&tools.to_schema_json(), &tool_call_schema_json());

    AgentComponents {
        planner: Planner::new(llm, cfg.llm.resolved_context_window()),
        executor: ToolExecutor::new(tools, cfg.tools.tool_timeout_secs),
        recovery: RecoveryEngine::new(),
        max_steps: cfg.app.max_steps,
        system_prompt,
    }
}

impl AgentComponents {
    /// 新建对话：历史以 system 指令开头，状态为空
    pub fn new_conversation(&self, id: impl Into<String>) -> Conversation {
        Conversation {
            state: SessionState::with_conversation_id(id),
            history: ConversationHistory::with_system(self.system_prompt.clone()),
        }
    }

    fn session<'a>(&'a self) -> ReactSession<'a> {
        ReactSession::new(&self.planner, &self.executor, &self.recovery)
            .with_max_steps(self.max_steps)
    }
}

/// 单个对话：独占的会话状态与历史
#[derive(Debug, Clone)]
pub struct Conversation {
    pub state: SessionState,
    pub history: ConversationHistory,
}

impl Conversation {
    pub fn id(&self) -> Option<&str> {
        self.state.conversation_id()
    }
}

/// 处理单条用户消息：跑主循环（无事件推送），返回最终回复
pub async fn process_message(
    components: &AgentComponents,
    conversation: &mut Conversation,
    user_input: &str,
) -> Result<ReactResult, AgentError> {
    let session = components.session();
    react_loop(
        &session,
        &mut conversation.state,
        &mut conversation.history,
        user_input,
    )
    .await
}

/// 流式处理单条用户消息：通过 event_tx 推送 ToolCall / Observation / StateSnapshot / MessageChunk 等事件
///
/// cancel_token 被取消后（如 SSE 客户端断开），下一步规划前返回 Cancelled。
pub async fn process_message_stream(
    components: &AgentComponents,
    conversation: &mut Conversation,
    user_input: &str,
    event_tx: mpsc::UnboundedSender<AgentEvent>,
    cancel_token: CancellationToken,
) -> Result<ReactResult, AgentError> {
    let session = components
        .session()
        .with_event_tx(&event_tx)
        .with_cancel_token(cancel_token);
    react_loop(
        &session,
        &mut conversation.state,
        &mut conversation.history,
        user_input,
    )
    .await
}
