//! 编码生成模板文档读取（read_code_generation_file）
//!
//! 按固定顺序在候选目录中查找模板文件，返回第一个命中文件的全文。
//! 每次调用都重新读取，不做缓存；找不到时返回说明文字而不是错误。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ReferenceSection;
use crate::tools::{Tool, ToolContext, ToolOutput};

pub const READ_CODE_GENERATION_FILE: &str = "read_code_generation_file";

/// 默认查找目录：<cwd>/agent/data、<cwd>/data、<cwd>/../data、<crate>/data
pub fn default_search_dirs() -> Vec<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    vec![
        cwd.join("agent").join("data"),
        cwd.join("data"),
        cwd.join("..").join("data"),
        Path::new(env!("CARGO_MANIFEST_DIR")).join("data"),
    ]
}

/// 读取第一个存在的候选文件；都不存在时 Err 为给模型看的说明文字
pub async fn read_reference_document(candidates: &[PathBuf]) -> Result<String, String> {
    for path in candidates {
        if !tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            continue;
        }
        return match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                tracing::debug!(path = %path.display(), bytes = content.len(), "reference document read");
                Ok(content)
            }
            Err(e) => Err(format!(
                "Error: failed to read code generation file {}: {}",
                path.display(),
                e
            )),
        };
    }

    let listed = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    tracing::warn!(candidates = %listed, "reference document not found");
    Err(format!(
        "Error: code generation file not found. No file existed at any of: {}",
        listed
    ))
}

/// read_code_generation_file 工具
pub struct ReadCodeGenerationFileTool {
    candidates: Vec<PathBuf>,
}

impl ReadCodeGenerationFileTool {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// 由 [reference] 配置得到候选文件列表
    pub fn from_config(cfg: &ReferenceSection) -> Self {
        let dirs = if cfg.search_dirs.is_empty() {
            default_search_dirs()
        } else {
            cfg.search_dirs.clone()
        };
        Self::new(dirs.into_iter().map(|d| d.join(&cfg.file_name)).collect())
    }
}

#[async_trait]
impl Tool for ReadCodeGenerationFileTool {
    fn name(&self) -> &str {
        READ_CODE_GENERATION_FILE
    }

    fn description(&self) -> &str {
        "Read the procurement code generation template. Call this before generating every code; \
         the template may change between requests. No arguments."
    }

    async fn execute(&self, _ctx: &mut ToolContext<'_>, _args: Value) -> Result<ToolOutput, String> {
        let text = match read_reference_document(&self.candidates).await {
            Ok(content) => content,
            Err(message) => message,
        };
        Ok(ToolOutput::text(text))
    }
}
