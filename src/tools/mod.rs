pub mod executor;
pub mod rag_query;
pub mod reference_doc;
pub mod registry;
pub mod reset;
pub mod save_code;
pub mod schema;

pub use executor::ToolExecutor;
pub use rag_query::{QueryRagSystemTool, QUERY_RAG_SYSTEM};
pub use reference_doc::{read_reference_document, ReadCodeGenerationFileTool, READ_CODE_GENERATION_FILE};
pub use registry::{Tool, ToolContext, ToolOutput, ToolRegistry};
pub use reset::{ResetConversationTool, RESET_CONVERSATION};
pub use save_code::{SaveProcurementCodeTool, SAVE_PROCUREMENT_CODE};
pub use schema::tool_call_schema_json;
