//! 计划执行器
//!
//! 计划是模型产出的有序操作步骤列表。逐步执行：深拷贝参数（共享计划
//! 对象的后续改动不影响已应用状态）、归一化旧版范围字段（r3→r2 /
//! c3→c2）、解码为封闭 Op 后 dispatch。单步失败即标注原因并停止后续
//! 步骤（不重试、不跳过），已成功的步骤全部保留。无论走到哪一步，
//! 收尾都强制全量重算并落一个 "agent" 检查点。部分成功是一等结果，
//! 不是错误。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::SheetError;
use crate::model::{Op, SheetModel};

/// 接受的计划步数上限
pub const MAX_PLAN_STEPS: usize = 30;

/// 对外开放的操作名（内部词汇 restoreSheet / setCells / noop 不在其列）
pub const PUBLIC_OPS: [&str; 6] = [
    "createSheet",
    "deleteSheet",
    "setValues",
    "setFormulas",
    "formatRange",
    "linkProvenance",
];

/// 单个计划步骤：操作名 + 未经校验的参数，执行后带上结果标注
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub op: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
}

/// 步骤结果：成功，或失败原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Failed(String),
}

/// 有序步骤序列
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

/// 执行结果：标注后的步骤 + 成功应用的步数
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub steps: Vec<PlanStep>,
    pub executed: usize,
}

/// 执行一份计划。首个失败步骤之后的步骤原样保留、不加标注。
pub fn execute(model: &mut SheetModel, plan: Plan) -> PlanOutcome {
    let total = plan.steps.len();
    let mut steps = Vec::with_capacity(total);
    let mut executed = 0;
    let mut halted = false;

    for mut step in plan.steps {
        if halted {
            steps.push(step);
            continue;
        }

        // 防御性拷贝：dispatch 只见到本步参数的私有副本
        let mut args = step.args.clone();
        normalize_legacy_keys(&mut args);

        match decode_step(&step.op, args).and_then(|op| model.dispatch(op)) {
            Ok(()) => {
                step.status = Some(StepStatus::Ok);
                executed += 1;
            }
            Err(e) => {
                tracing::warn!(op = %step.op, error = %e, "plan step failed, halting");
                step.status = Some(StepStatus::Failed(e.to_string()));
                halted = true;
            }
        }
        steps.push(step);
    }

    // 无论是否提前停止：全量重算 + 检查点
    model.evaluate_all();
    model.checkpoint("agent");
    tracing::info!(executed, total, "plan finished");

    PlanOutcome { steps, executed }
}

/// 操作名 + 参数对象 → 类型化 Op。未知操作名与参数形状错误分开报告。
fn decode_step(name: &str, args: Value) -> Result<Op, SheetError> {
    if !PUBLIC_OPS.contains(&name) {
        return Err(SheetError::UnknownOp(name.to_string()));
    }
    let mut object = match args {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(SheetError::BadArgs(format!(
                "expected object arguments, got {}",
                other
            )))
        }
    };
    object.insert("op".to_string(), Value::String(name.to_string()));
    serde_json::from_value(Value::Object(object))
        .map_err(|e| SheetError::BadArgs(format!("{}: {}", name, e)))
}

/// 旧版计划形状兼容：对象里出现 r3/c3 而缺 r2/c2 时改名，递归整个参数树
fn normalize_legacy_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (old, new) in [("r3", "r2"), ("c3", "c2")] {
                if map.contains_key(old) && !map.contains_key(new) {
                    if let Some(v) = map.remove(old) {
                        map.insert(new.to_string(), v);
                    }
                }
            }
            for (_, v) in map.iter_mut() {
                normalize_legacy_keys(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                normalize_legacy_keys(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, DEFAULT_SHEET};
    use serde_json::json;

    fn step(op: &str, args: Value) -> PlanStep {
        PlanStep {
            op: op.to_string(),
            args,
            status: None,
        }
    }

    #[test]
    fn failing_step_halts_but_keeps_prior_progress() {
        let mut model = SheetModel::new();
        let plan = Plan {
            steps: vec![
                step(
                    "setValues",
                    json!({
                        "range": {"sheet": DEFAULT_SHEET, "r1": 0, "c1": 0, "r2": 0, "c2": 0},
                        "values": [[7.0]],
                    }),
                ),
                // 不存在的表：结构性失败
                step(
                    "setValues",
                    json!({
                        "range": {"sheet": "Ghost", "r1": 0, "c1": 0, "r2": 0, "c2": 0},
                        "values": [[1.0]],
                    }),
                ),
                step("createSheet", json!({"name": "Never"})),
            ],
        };

        let outcome = execute(&mut model, plan);

        assert_eq!(outcome.executed, 1);
        assert_eq!(outcome.steps[0].status, Some(StepStatus::Ok));
        assert!(matches!(
            outcome.steps[1].status,
            Some(StepStatus::Failed(_))
        ));
        assert_eq!(outcome.steps[2].status, None);

        // 第 1 步生效，第 3 步从未执行
        let wb = model.workbook();
        assert_eq!(
            wb.sheets[DEFAULT_SHEET].cell(0, 0).unwrap().value,
            CellValue::Number(7.0)
        );
        assert!(!wb.sheets.contains_key("Never"));

        // 检查点仍然落了
        assert_eq!(wb.checkpoints.last().unwrap().name, "agent");
    }

    #[test]
    fn legacy_range_keys_are_normalized() {
        let mut model = SheetModel::new();
        let plan = Plan {
            steps: vec![step(
                "setValues",
                json!({
                    "range": {"sheet": DEFAULT_SHEET, "r1": 0, "c1": 0, "r3": 1, "c3": 1},
                    "values": [[1.0, 2.0], [3.0, 4.0]],
                }),
            )],
        };
        let outcome = execute(&mut model, plan);
        assert_eq!(outcome.executed, 1);
        assert_eq!(
            model.workbook().sheets[DEFAULT_SHEET].cell(1, 1).unwrap().value,
            CellValue::Number(4.0)
        );
    }

    #[test]
    fn internal_ops_are_not_in_the_plan_vocabulary() {
        let mut model = SheetModel::new();
        let plan = Plan {
            steps: vec![step("setCells", json!({}))],
        };
        let outcome = execute(&mut model, plan);
        assert_eq!(outcome.executed, 0);
        assert!(matches!(
            &outcome.steps[0].status,
            Some(StepStatus::Failed(reason)) if reason.contains("setCells")
        ));
    }

    #[test]
    fn bad_argument_shape_is_reported_per_step() {
        let mut model = SheetModel::new();
        let plan = Plan {
            steps: vec![step("createSheet", json!({"title": "oops"}))],
        };
        let outcome = execute(&mut model, plan);
        assert!(matches!(
            outcome.steps[0].status,
            Some(StepStatus::Failed(_))
        ));
    }

    #[test]
    fn plan_execution_leaves_workbook_recomputed() {
        let mut model = SheetModel::new();
        let plan = Plan {
            steps: vec![
                step(
                    "setValues",
                    json!({
                        "range": {"sheet": DEFAULT_SHEET, "r1": 0, "c1": 0, "r2": 0, "c2": 1},
                        "values": [[2.0, 3.0]],
                    }),
                ),
                step(
                    "setFormulas",
                    json!({
                        "range": {"sheet": DEFAULT_SHEET, "r1": 0, "c1": 2, "r2": 0, "c2": 2},
                        "formulas": [["=A1+B1"]],
                    }),
                ),
            ],
        };
        execute(&mut model, plan);

        let projection = model.to_json();
        let row = &projection["sheets"][0]["rows"][0];
        assert_eq!(row[2]["value"], json!(5.0));
        assert_eq!(row[2]["formula"], json!("=A1+B1"));
    }
}
