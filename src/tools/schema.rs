//! 工具调用 JSON Schema 生成（schemars）
//!
//! 工具参数结构体派生 JsonSchema，由此生成 parameters_schema；
//! tool_call_schema_json 给出「合法 tool call」的整体格式，拼入 system prompt，减少 LLM 输出格式错误。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 工具调用请求格式：与 planner 解析的 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 read_code_generation_file、query_rag_system、reset_conversation、save_procurement_code
    pub tool: String,
    /// 工具参数，依工具不同而不同
    pub args: serde_json::Map<String, Value>,
}

/// 返回工具调用的 JSON Schema 字符串
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 由参数结构体生成 JSON Schema
pub fn args_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Example {
        /// 查询
        query: String,
    }

    #[test]
    fn test_args_schema_has_required_field() {
        let schema = args_schema::<Example>();
        assert_eq!(schema["properties"]["query"]["type"], "string");
        assert_eq!(schema["required"][0], "query");
    }

    #[test]
    fn test_tool_call_schema_mentions_fields() {
        let s = tool_call_schema_json();
        assert!(s.contains("\"tool\""));
        assert!(s.contains("\"args\""));
    }
}
