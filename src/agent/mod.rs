//! Agent 编排层：工作簿摘要、过程事件与目标驱动的计划编排

pub mod events;
pub mod orchestrator;
pub mod summary;

pub use events::AgentEvent;
pub use orchestrator::{AgentHints, Orchestrator};
pub use summary::summarize;
