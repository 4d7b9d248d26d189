//! 编排过程事件：用于流式 / SSE 展示上下文、增量 Token、计划与结果
//!
//! 正常序列 status → context → token* → plan → done；任何阶段可被
//! 终态 error 打断。

use serde::Serialize;

use crate::plan::PlanStep;

/// 单次编排的过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// 阶段提示（构建上下文 / 等待模型等）
    Status { text: String },
    /// 发给模型的工作簿摘要
    Context { summary: String },
    /// 模型的一小段增量输出
    Token { text: String },
    /// 解析出的计划（执行前）
    Plan { steps: Vec<PlanStep> },
    /// 执行完毕：成功步数 + 最新工作簿投影
    Done {
        executed: usize,
        workbook: serde_json::Value,
    },
    /// 终态错误
    Error { text: String },
}
