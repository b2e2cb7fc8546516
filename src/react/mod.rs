//! 编排层：Planner、主循环、过程事件

pub mod events;
pub mod loop_;
pub mod planner;

pub use events::AgentEvent;
pub use loop_::{react_loop, ReactResult, ReactSession, DEFAULT_MAX_STEPS};
pub use planner::{parse_llm_output, Planner, PlannerOutput, ToolCall};
