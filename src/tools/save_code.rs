//! 采购编码保存工具（save_procurement_code）
//!
//! 不校验编码格式（格式由模板文档与提示词约束），直接追加到会话状态并返回完整快照。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::args_schema;
use crate::tools::{Tool, ToolContext, ToolOutput};

pub const SAVE_PROCUREMENT_CODE: &str = "save_procurement_code";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveCodeArgs {
    /// 最终确定的采购编码
    pub code: String,
    /// 编码对应物料的简短描述
    pub description: String,
}

/// save_procurement_code 工具
pub struct SaveProcurementCodeTool;

#[async_trait]
impl Tool for SaveProcurementCodeTool {
    fn name(&self) -> &str {
        SAVE_PROCUREMENT_CODE
    }

    fn description(&self) -> &str {
        "Save a finalized procurement code and its description to the user's code list. \
         Returns the updated state."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<SaveCodeArgs>()
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, args: Value) -> Result<ToolOutput, String> {
        let args: SaveCodeArgs =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
        let snapshot = ctx.state.save_code(args.code, args.description);
        let content = serde_json::to_string(&snapshot).map_err(|e| e.to_string())?;
        Ok(ToolOutput::with_snapshot(content, snapshot))
    }
}
