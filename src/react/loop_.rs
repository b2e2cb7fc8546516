//! Agent 主循环
//!
//! Plan -> Act (Tool) -> Observe -> 下一轮 Plan；支持 RetryWithPrompt、Cancel、最大步数限制。
//! 工具通过 ToolContext 独占借用本对话的 SessionState 与历史；返回快照时推送 StateSnapshot 事件。

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::memory::{ConversationHistory, Message};
use crate::react::planner::{parse_llm_output, Planner, PlannerOutput, ToolCall};
use crate::react::AgentEvent;
use crate::session::{SessionState, StateSnapshot};
use crate::tools::{ToolContext, ToolExecutor};

/// 单次用户轮次内默认最大步数，防止死循环
pub const DEFAULT_MAX_STEPS: usize = 20;
/// 流式回复时每段字符数
const CHUNK_CHARS: usize = 6;
/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 一轮循环的结果：最终回复，以及本轮最后一次状态快照（若有工具修改了状态）
#[derive(Debug)]
pub struct ReactResult {
    pub response: String,
    pub snapshot: Option<StateSnapshot>,
}

/// 循环所需的只读组件与可选事件通道
pub struct ReactSession<'a> {
    pub planner: &'a Planner,
    pub executor: &'a ToolExecutor,
    pub recovery: &'a RecoveryEngine,
    pub max_steps: usize,
    pub cancel_token: CancellationToken,
    pub event_tx: Option<&'a UnboundedSender<AgentEvent>>,
}

impl<'a> ReactSession<'a> {
    pub fn new(
        planner: &'a Planner,
        executor: &'a ToolExecutor,
        recovery: &'a RecoveryEngine,
    ) -> Self {
        Self {
            planner,
            executor,
            recovery,
            max_steps: DEFAULT_MAX_STEPS,
            cancel_token: CancellationToken::new(),
            event_tx: None,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<AgentEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send(&self, ev: AgentEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// 执行一轮用户请求
///
/// 用户输入写入历史 -> plan -> 解析输出 ->
/// 若 ToolCall 则写入在途调用、执行、写回 ToolResult ->
/// 若 Response 则写入 assistant 回复并返回
pub async fn react_loop(
    session: &ReactSession<'_>,
    state: &mut SessionState,
    history: &mut ConversationHistory,
    user_input: &str,
) -> Result<ReactResult, AgentError> {
    history.push(Message::user(user_input));

    let (init_prompt, init_completion, _) = session.planner.token_usage();
    let mut last_snapshot: Option<StateSnapshot> = None;
    // 纠错提示只附加在下一次规划请求中，不写入历史，重置时不会把它当作用户请求
    let mut correction: Option<(String, String)> = None;
    let mut last_output = String::new();

    for step in 0..session.max_steps {
        session.send(AgentEvent::StepUpdate {
            step,
            max_steps: session.max_steps,
        });

        if session.cancel_token.is_cancelled() {
            session.send(AgentEvent::Error {
                text: "Cancelled by user".to_string(),
            });
            return Err(AgentError::Cancelled);
        }

        let mut messages = history.messages().to_vec();
        if let Some((bad_output, prompt)) = correction.take() {
            messages.push(Message::assistant(bad_output));
            messages.push(Message::user(prompt));
        }

        session.send(AgentEvent::Thinking);
        let output = match session.planner.plan(&messages).await {
            Ok(o) => o,
            Err(e) => {
                let action = session.recovery.handle(&e, &session.executor.tool_names());
                return Err(fail(session, action, e));
            }
        };
        last_output = output.clone();

        let call = match parse_llm_output(&output) {
            Ok(PlannerOutput::Response(resp)) => {
                for chunk in resp.chars().collect::<Vec<_>>().chunks(CHUNK_CHARS) {
                    session.send(AgentEvent::MessageChunk {
                        text: chunk.iter().collect(),
                    });
                }
                session.send(AgentEvent::MessageDone);
                history.push(Message::assistant(resp.clone()));

                let (cur_prompt, cur_completion, _) = session.planner.token_usage();
                let prompt_tokens = cur_prompt.saturating_sub(init_prompt);
                let completion_tokens = cur_completion.saturating_sub(init_completion);
                session.send(AgentEvent::TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                });

                return Ok(ReactResult {
                    response: resp,
                    snapshot: last_snapshot,
                });
            }
            Ok(PlannerOutput::ToolCall(tc)) if session.executor.has_tool(&tc.tool) => tc,
            Ok(PlannerOutput::ToolCall(tc)) => {
                tracing::warn!(tool = %tc.tool, "model requested an unknown tool");
                let e = AgentError::HallucinatedTool(tc.tool);
                correction = Some((output, retry_prompt(session, e)?));
                continue;
            }
            Err(e) => {
                correction = Some((output, retry_prompt(session, e)?));
                continue;
            }
        };

        run_tool(session, state, history, call, &mut last_snapshot).await;
    }

    tracing::warn!(max_steps = session.max_steps, "step limit reached");
    Ok(ReactResult {
        response: format!(
            "Reached the step limit ({}) without a final answer. Last output:\n{}",
            session.max_steps, last_output
        ),
        snapshot: last_snapshot,
    })
}

/// 写入在途调用，执行工具，写回结果；基础设施失败转成 "Error: ..." 观察交给模型
async fn run_tool(
    session: &ReactSession<'_>,
    state: &mut SessionState,
    history: &mut ConversationHistory,
    call: ToolCall,
    last_snapshot: &mut Option<StateSnapshot>,
) {
    session.send(AgentEvent::ToolCall {
        call_id: call.id.clone(),
        tool: call.tool.clone(),
        args: call.args.clone(),
    });
    history.push(Message::tool_call(call.clone()));

    let result = {
        let mut ctx = ToolContext::new(state, history);
        session
            .executor
            .execute(&call.tool, &mut ctx, call.args.clone())
            .await
    };

    let observation = match result {
        Ok(output) => {
            if let Some(snapshot) = output.snapshot {
                session.send(AgentEvent::StateSnapshot {
                    snapshot: snapshot.snapshot.clone(),
                });
                *last_snapshot = Some(snapshot);
            }
            output.content
        }
        Err(e) => {
            session.send(AgentEvent::ToolFailure {
                tool: call.tool.clone(),
                reason: e.to_string(),
            });
            format!("Error: {}", e)
        }
    };

    session.send(AgentEvent::Observation {
        tool: call.tool.clone(),
        preview: preview(&observation, OBSERVATION_PREVIEW_CHARS),
    });
    history.push(Message::tool_result(&call, observation));
}

/// 解析失败或幻觉工具：只接受 RetryWithPrompt，其余动作终止本轮
fn retry_prompt(session: &ReactSession<'_>, e: AgentError) -> Result<String, AgentError> {
    match session.recovery.handle(&e, &session.executor.tool_names()) {
        RecoveryAction::RetryWithPrompt(prompt) => {
            session.send(AgentEvent::Recovery {
                action: "RetryWithPrompt".to_string(),
                detail: prompt.clone(),
            });
            Ok(prompt)
        }
        other => Err(fail(session, other, e)),
    }
}

fn fail(session: &ReactSession<'_>, action: RecoveryAction, e: AgentError) -> AgentError {
    let (name, detail) = match action {
        RecoveryAction::RetryWithPrompt(p) => ("RetryWithPrompt", p),
        RecoveryAction::AskUser(msg) => ("AskUser", msg),
        RecoveryAction::Abort => ("Abort", e.to_string()),
    };
    session.send(AgentEvent::Recovery {
        action: name.to_string(),
        detail,
    });
    session.send(AgentEvent::Error {
        text: e.to_string(),
    });
    e
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::memory::Role;
    use crate::tools::{ResetConversationTool, SaveProcurementCodeTool, ToolRegistry};

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(SaveProcurementCodeTool);
        registry.register(ResetConversationTool);
        ToolExecutor::new(registry, 5)
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool": "save_procurement_code", "args": {"code": "CFR01067261", "description": "Steel I-beam"}}"#,
            "Saved CFR01067261.",
        ]));
        let planner = Planner::new(llm, 100_000);
        let executor = executor();
        let recovery = RecoveryEngine::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let session = ReactSession::new(&planner, &executor, &recovery).with_event_tx(&tx);

        let mut state = SessionState::new();
        let mut history = ConversationHistory::with_system("sys");
        let result = react_loop(&session, &mut state, &mut history, "save it")
            .await
            .unwrap();

        assert_eq!(result.response, "Saved CFR01067261.");
        assert_eq!(state.procurement_codes.len(), 1);
        assert!(result.snapshot.is_some());

        let roles: Vec<Role> = history.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::ToolResult,
                Role::Assistant
            ]
        );

        drop(tx);
        let mut saw_snapshot = false;
        while let Some(ev) = rx.recv().await {
            if let AgentEvent::StateSnapshot { snapshot } = ev {
                assert_eq!(snapshot.procurement_codes[0].code, "CFR01067261");
                saw_snapshot = true;
            }
        }
        assert!(saw_snapshot);
    }

    #[tokio::test]
    async fn test_hallucinated_tool_retries_with_tool_list() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool": "lookup_supplier", "args": {}}"#,
            "No supplier lookup is available.",
        ]));
        let planner = Planner::new(llm.clone(), 100_000);
        let executor = executor();
        let recovery = RecoveryEngine::new();
        let session = ReactSession::new(&planner, &executor, &recovery);

        let mut state = SessionState::new();
        let mut history = ConversationHistory::with_system("sys");
        let result = react_loop(&session, &mut state, &mut history, "find a supplier")
            .await
            .unwrap();
        assert_eq!(result.response, "No supplier lookup is available.");

        let second_call = &llm.received()[1];
        let prompt = second_call.last().unwrap().text_content();
        assert!(prompt.contains("lookup_supplier"));
        assert!(prompt.contains("reset_conversation, save_procurement_code"));
        // 纠错提示不进入历史
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_truncated_call_is_retried_not_answered() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool": "save_procurement_code", "args": {"code": "CFR01"#,
            "Which description should I save?",
        ]));
        let planner = Planner::new(llm.clone(), 100_000);
        let executor = executor();
        let recovery = RecoveryEngine::new();
        let session = ReactSession::new(&planner, &executor, &recovery);

        let mut state = SessionState::new();
        let mut history = ConversationHistory::with_system("sys");
        let result = react_loop(&session, &mut state, &mut history, "save CFR01")
            .await
            .unwrap();

        assert_eq!(result.response, "Which description should I save?");
        let retry = llm.received()[1].last().unwrap().text_content();
        assert!(retry.contains("not valid tool-call JSON"));
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn test_tool_argument_error_becomes_observation() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool": "save_procurement_code", "args": {"code": "X"}}"#,
            "I need a description first.",
        ]));
        let planner = Planner::new(llm, 100_000);
        let executor = executor();
        let recovery = RecoveryEngine::new();
        let session = ReactSession::new(&planner, &executor, &recovery);

        let mut state = SessionState::new();
        let mut history = ConversationHistory::with_system("sys");
        react_loop(&session, &mut state, &mut history, "save X")
            .await
            .unwrap();

        let observation = crate::llm::openai::render_message_text(&history.messages()[3]);
        assert!(observation.contains("Error: Tool execution failed"));
        assert!(state.procurement_codes.is_empty());
    }

    #[tokio::test]
    async fn test_step_limit() {
        let looping = r#"{"tool": "reset_conversation"}"#;
        let llm = Arc::new(ScriptedLlmClient::new([looping, looping, looping]));
        let planner = Planner::new(llm, 100_000);
        let executor = executor();
        let recovery = RecoveryEngine::new();
        let session = ReactSession::new(&planner, &executor, &recovery).with_max_steps(3);

        let mut state = SessionState::new();
        let mut history = ConversationHistory::with_system("sys");
        let result = react_loop(&session, &mut state, &mut history, "loop")
            .await
            .unwrap();
        assert!(result.response.starts_with("Reached the step limit (3)"));
    }

    #[tokio::test]
    async fn test_cancelled_before_planning() {
        let llm = Arc::new(ScriptedLlmClient::new(["unused"]));
        let planner = Planner::new(llm, 100_000);
        let executor = executor();
        let recovery = RecoveryEngine::new();
        let token = CancellationToken::new();
        token.cancel();
        let session = ReactSession::new(&planner, &executor, &recovery).with_cancel_token(token);

        let mut state = SessionState::new();
        let mut history = ConversationHistory::new();
        let err = react_loop(&session, &mut state, &mut history, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }
}
