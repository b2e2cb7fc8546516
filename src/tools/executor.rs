//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute 在超时内调用 registry.execute，
//! 超时或失败时转为 AgentError（ToolTimeout / ToolExecutionFailed）；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{ToolContext, ToolOutput, ToolRegistry};

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；超时返回 ToolTimeout，工具返回 Err 则转为 ToolExecutionFailed
    pub async fn execute(
        &self,
        tool_name: &str,
        ctx: &mut ToolContext<'_>,
        args: serde_json::Value,
    ) -> Result<ToolOutput, AgentError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, ctx, args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e)),
            Err(_) => Err(AgentError::ToolTimeout(tool_name.to_string())),
        }
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ConversationHistory;
    use crate::session::SessionState;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::Value;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn execute(&self, _ctx: &mut ToolContext<'_>, _args: Value) -> Result<ToolOutput, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ToolOutput::text("late"))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn execute(&self, _ctx: &mut ToolContext<'_>, _args: Value) -> Result<ToolOutput, String> {
            Err("bad args".to_string())
        }
    }

    fn executor(timeout_secs: u64) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        registry.register(FailingTool);
        ToolExecutor::new(registry, timeout_secs)
    }

    #[tokio::test]
    async fn test_timeout() {
        let exec = executor(1);
        let mut state = SessionState::new();
        let mut history = ConversationHistory::new();
        let mut ctx = ToolContext::new(&mut state, &mut history);
        let err = exec.execute("slow", &mut ctx, Value::Null).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolTimeout(ref t) if t == "slow"));
    }

    #[tokio::test]
    async fn test_failure_and_unknown() {
        let exec = executor(5);
        let mut state = SessionState::new();
        let mut history = ConversationHistory::new();
        let mut ctx = ToolContext::new(&mut state, &mut history);

        let err = exec.execute("fail", &mut ctx, Value::Null).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolExecutionFailed(ref m) if m == "bad args"));

        let err = exec.execute("nope", &mut ctx, Value::Null).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolExecutionFailed(ref m) if m.contains("Unknown tool")));
        assert_eq!(exec.tool_names(), vec!["fail".to_string(), "slow".to_string()]);
    }
}
