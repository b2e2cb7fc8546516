//! 会话层：会话状态、引用追踪、对话重置

pub mod citation;
pub mod reset;
pub mod state;

pub use citation::{remap_inline_citations, truncate_preview, CitationTracker, DEFAULT_PREVIEW_CHARS};
pub use reset::{isolate_latest_request, reset_conversation, ResetError, ResetOutcome};
pub use state::{ProcurementCode, SessionState, StateSnapshot};
