//! Agent 编排器：目标 → 计划 → 执行
//!
//! 唯一与外部模型服务打交道的组件。流程：构建有界工作簿摘要、拼装
//! 消息、流式接收 Token 并即时上报，但完整缓冲后才解析——绝不解析半截
//! JSON。流结束后剥掉 BOM 与代码围栏再 serde 解析；解析失败上报终态
//! error 且本层不重试（重试 / 修复属于后端实现的事）。解析成功的计划
//! 交给计划执行器，结果连同最新工作簿投影一并上报。

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::AgentSection;
use crate::core::AgentError;
use crate::llm::{ChatMessage, LlmClient};
use crate::model::SheetModel;
use crate::plan::{self, Plan, PlanOutcome, PlanStep, PUBLIC_OPS};

use super::events::AgentEvent;
use super::summary::summarize;

/// 调用方提供的落位提示
#[derive(Debug, Clone, Default)]
pub struct AgentHints {
    /// 优先写入的工作表
    pub sheet: Option<String>,
    /// 优先的插入起始行（零基）
    pub row: Option<usize>,
}

/// 编排器：持有后端句柄与摘要 / 计划上限
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    caps: AgentSection,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, caps: AgentSection) -> Self {
        Self { llm, caps }
    }

    /// 执行一个目标。事件序列 status → context → token* → plan → done，
    /// 任何阶段失败以 error 终止。事件发送尽力而为：接收端关闭不算失败。
    pub async fn run(
        &self,
        model: &mut SheetModel,
        goal: &str,
        hints: &AgentHints,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<PlanOutcome, AgentError> {
        match self.run_inner(model, goal, hints, events).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let _ = events
                    .send(AgentEvent::Error { text: e.to_string() })
                    .await;
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        model: &mut SheetModel,
        goal: &str,
        hints: &AgentHints,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<PlanOutcome, AgentError> {
        let _ = events
            .send(AgentEvent::Status {
                text: "building workbook context".into(),
            })
            .await;

        let summary = summarize(model.workbook(), &self.caps);
        let _ = events
            .send(AgentEvent::Context {
                summary: summary.clone(),
            })
            .await;

        let messages = build_messages(goal, hints, &summary, self.caps.max_plan_steps);

        let _ = events
            .send(AgentEvent::Status {
                text: "waiting for model".into(),
            })
            .await;

        // 增量上报，完整缓冲
        let mut stream = self.llm.complete_stream(&messages).await?;
        let mut buffer = String::new();
        while let Some(item) = stream.next().await {
            let token = item?;
            buffer.push_str(&token);
            let _ = events.send(AgentEvent::Token { text: token }).await;
        }

        let plan = parse_plan(&buffer, self.caps.max_plan_steps)?;
        let _ = events
            .send(AgentEvent::Plan {
                steps: plan.steps.clone(),
            })
            .await;

        let outcome = plan::execute(model, plan);
        let _ = events
            .send(AgentEvent::Done {
                executed: outcome.executed,
                workbook: model.to_json(),
            })
            .await;
        Ok(outcome)
    }
}

fn build_messages(
    goal: &str,
    hints: &AgentHints,
    summary: &str,
    max_steps: usize,
) -> Vec<ChatMessage> {
    let system = format!(
        "You are a spreadsheet planning assistant. Reply with a raw JSON array of \
         at most {} steps, no code fences, no commentary. Each step is \
         {{\"op\": <name>, \"args\": {{...}}}}. Allowed ops: {}. Ranges are \
         {{\"sheet\", \"r1\", \"c1\", \"r2\", \"c2\"}} with zero-based inclusive \
         coordinates.",
        max_steps,
        PUBLIC_OPS.join(", "),
    );

    let mut user = format!("Goal: {}\n", goal);
    if let Some(sheet) = &hints.sheet {
        user.push_str(&format!("Preferred sheet: {}\n", sheet));
    }
    if let Some(row) = hints.row {
        user.push_str(&format!("Preferred insertion row (zero-based): {}\n", row));
    }
    user.push_str("\nCurrent workbook:\n");
    user.push_str(summary);

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// 剥掉 BOM 与 ``` 围栏（可带 json 语言标记）
pub(crate) fn strip_wrapping(raw: &str) -> &str {
    let mut text = raw.trim_start_matches('\u{feff}').trim();
    if let Some(rest) = text.strip_prefix("```") {
        // 去掉围栏首行的语言标记
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.strip_suffix("```").unwrap_or(rest).trim();
    }
    text
}

/// 完整文本 → 计划。接受裸数组或 {"steps": [...]}；
/// 步骤缺 "args" 时把 "op" 之外的字段整体当作参数。超长截断。
pub(crate) fn parse_plan(raw: &str, max_steps: usize) -> Result<Plan, AgentError> {
    let text = strip_wrapping(raw);
    let value: Value =
        serde_json::from_str(text).map_err(|e| AgentError::PlanParse(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("steps") {
            Some(Value::Array(items)) => items,
            _ => return Err(AgentError::PlanParse("expected an array of steps".into())),
        },
        _ => return Err(AgentError::PlanParse("expected an array of steps".into())),
    };

    let mut steps = Vec::new();
    for item in items {
        let Value::Object(mut map) = item else {
            return Err(AgentError::PlanParse("step is not an object".into()));
        };
        let op = map
            .remove("op")
            .and_then(|v| v.as_str().map(String::from))
            .ok_or_else(|| AgentError::PlanParse("step missing \"op\"".into()))?;
        let args = match map.remove("args") {
            Some(args) => args,
            None => Value::Object(map),
        };
        steps.push(PlanStep {
            op,
            args,
            status: None,
        });
    }

    if steps.len() > max_steps {
        tracing::warn!(
            steps = steps.len(),
            max_steps,
            "model plan exceeds step cap, truncating"
        );
        steps.truncate(max_steps);
    }

    Ok(Plan { steps })
}
