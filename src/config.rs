//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 .env（若存在），再读 TOML 文件，最后用环境变量 `PROCURE__*` 覆盖
//! （双下划线表示嵌套，如 `PROCURE__RAG__TOP_K=8`）。
//! 未在配置中出现的键回退到扁平环境变量（OPENAI_API_KEY、OPENAI_MODEL、TOP_K 等），最后才用内置默认值。

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_EMBEDDING_MODEL: &str = "BAAI/bge-large-en-v1.5";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_CONTEXT_WINDOW: usize = 128_000;
pub const DEFAULT_TOP_K: usize = 5;

/// 读取非空环境变量
fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_nonempty(key).and_then(|v| v.trim().parse().ok())
}

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub embedding: EmbeddingSection,
    pub rag: RagSection,
    pub reference: ReferenceSection,
    pub tools: ToolsSection,
    pub web: WebSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 单轮用户输入内最多的模型调用步数
    pub max_steps: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            max_steps: 20,
        }
    }
}

/// [llm] 段：OpenAI 兼容端点（默认 DeepSeek）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub context_window: Option<usize>,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_key: None,
            max_tokens: None,
            context_window: None,
            request_timeout_secs: 60,
        }
    }
}

impl LlmSection {
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .or_else(|| env_nonempty("OPENAI_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .or_else(|| env_nonempty("OPENAI_MODEL"))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// 未配置时返回 None（上层退回 Mock LLM）
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env_nonempty("OPENAI_API_KEY"))
    }

    pub fn resolved_max_tokens(&self) -> u32 {
        self.max_tokens
            .or_else(|| env_parsed("LLM_MAX_TOKENS"))
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn resolved_context_window(&self) -> usize {
        self.context_window
            .or_else(|| env_parsed("LLM_CONTEXT_WINDOW"))
            .unwrap_or(DEFAULT_CONTEXT_WINDOW)
    }
}

/// [embedding] 段：嵌入模型与端点（端点未设置时与 LLM 共用）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl EmbeddingSection {
    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .or_else(|| env_nonempty("EMBEDDING_MODEL"))
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string())
    }

    pub fn resolved_base_url(&self, llm: &LlmSection) -> String {
        self.base_url
            .clone()
            .or_else(|| env_nonempty("EMBEDDING_BASE_URL"))
            .unwrap_or_else(|| llm.resolved_base_url())
    }

    pub fn resolved_api_key(&self, llm: &LlmSection) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env_nonempty("EMBEDDING_API_KEY"))
            .or_else(|| llm.resolved_api_key())
    }
}

/// [rag] 段：索引位置与检索参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagSection {
    /// 0 或未设置时用默认值 5
    pub top_k: Option<usize>,
    /// 覆盖默认的存储目录候选列表
    pub storage_dirs: Vec<PathBuf>,
    /// 为 true 时索引不可用将导致启动失败
    pub required: bool,
    /// 引用来源预览的最大字符数
    pub preview_chars: usize,
}

impl Default for RagSection {
    fn default() -> Self {
        Self {
            top_k: None,
            storage_dirs: Vec::new(),
            required: false,
            preview_chars: crate::session::DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl RagSection {
    pub fn resolved_top_k(&self) -> usize {
        self.top_k
            .or_else(|| env_parsed("TOP_K"))
            .filter(|k| *k > 0)
            .unwrap_or(DEFAULT_TOP_K)
    }
}

/// [reference] 段：编码生成模板文档
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReferenceSection {
    pub file_name: String,
    /// 覆盖默认的查找目录列表
    pub search_dirs: Vec<PathBuf>,
}

impl Default for ReferenceSection {
    fn default() -> Self {
        Self {
            file_name: "code_generation.md".to_string(),
            search_dirs: Vec::new(),
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// [web] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub bind: String,
    /// 对话闲置超过该秒数后从内存中移除
    pub idle_timeout_secs: u64,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            idle_timeout_secs: 3600,
        }
    }
}

/// 环境变量中按逗号拆分为列表的键
const LIST_KEYS: [&str; 2] = ["reference.search_dirs", "rag.storage_dirs"];

/// 从 config 目录加载配置，环境变量 PROCURE__* 可覆盖
///
/// 1. 读取当前目录的 .env（不存在则忽略）
/// 2. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 3. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 4. 最后叠加环境变量 PROCURE__*（双下划线表示嵌套键，列表键用逗号分隔）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    load_env_file(None);
    build_config(config_path)
}

/// 读取 .env 到进程环境；已存在的变量不会被覆盖
fn load_env_file(path: Option<&Path>) {
    let loaded = match path {
        Some(p) => dotenvy::from_path(p).map(|_| p.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    if let Ok(path) = loaded {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
}

fn build_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    let mut env = config::Environment::with_prefix("PROCURE")
        .separator("__")
        .list_separator(",")
        .try_parsing(true);
    for key in LIST_KEYS {
        env = env.with_list_parse_key(key);
    }
    builder = builder.add_source(env);

    let c = builder.build()?;
    c.try_deserialize()
}
