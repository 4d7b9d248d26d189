//! Tabula - Rust 智能表格引擎
//!
//! 模块划分：
//! - **agent**: 编排器（工作簿摘要、流式过程事件、目标 → 计划）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类（结构性 / 后端 / 编排）
//! - **eval**: 公式求值器（SUM / 引用重写、循环检测、递归下降解析）
//! - **ingest**: 财务报表摄取边界（解析结构 → 工作表）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / 裸线协议 / DeepSeek / Mock）
//! - **model**: 工作簿状态引擎（可逆操作、事件日志、撤销、溯源）
//! - **observability**: tracing 日志初始化
//! - **plan**: 计划类型与逐步事务化执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod eval;
pub mod ingest;
pub mod llm;
pub mod model;
pub mod observability;
pub mod plan;
