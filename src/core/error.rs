//! 错误类型定义
//!
//! 三层分类：结构性错误（SheetError）同步返回给 dispatch 调用方；
//! 求值错误不在此处出现——循环引用与表达式失败编码为单元格值（#REF! / #ERROR!）；
//! 后端与编排错误见 LlmError / AgentError。

use thiserror::Error;

/// 工作簿结构性错误：未知表、重名表、未知操作、非法引用与参数
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),

    #[error("Sheet already exists: {0}")]
    DuplicateSheet(String),

    #[error("Unknown operation: {0}")]
    UnknownOp(String),

    #[error("Invalid cell reference: {0}")]
    BadRef(String),

    #[error("Invalid operation arguments: {0}")]
    BadArgs(String),
}

/// LLM 后端错误：网络 / API 状态 / 输出格式 / 流中断
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Malformed output: {0}")]
    Malformed(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// 编排层错误：计划解析失败，或下层错误透传
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Plan parse error: {0}")]
    PlanParse(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Sheet(#[from] SheetError),
}
