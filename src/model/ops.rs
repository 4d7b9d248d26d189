//! 操作词汇表与事件日志类型
//!
//! Op 是封闭的带标签和类型化参数的操作集合（serde tag = "op"）：
//! 不可信 JSON（模型产出的计划步骤）必须先解码为 Op 再进入 dispatch。
//! restoreSheet / setCells / noop 仅供内部逆操作回放使用，不对外开放。

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cell::{Cell, CellFormat, CellValue, Provenance};
use super::refs::RangeRef;
use super::sheet::Sheet;

/// 封闭操作集。变体名即外部操作名（camelCase）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Op {
    CreateSheet {
        name: String,
    },
    DeleteSheet {
        name: String,
    },
    /// 仅作为 deleteSheet 的逆：整表回填，同名覆盖
    RestoreSheet {
        sheet: Sheet,
    },
    SetValues {
        range: RangeRef,
        values: Vec<Vec<CellValue>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provenance: Option<Provenance>,
    },
    SetFormulas {
        range: RangeRef,
        formulas: Vec<Vec<Option<String>>>,
    },
    FormatRange {
        range: RangeRef,
        format: Option<CellFormat>,
    },
    LinkProvenance {
        range: RangeRef,
        provenance: Vec<Provenance>,
    },
    /// 仅作为逆操作：原样回放前像快照。自身的逆是 noop，
    /// 因此 undo 的 undo 不会对称地恢复 undo 前的状态（刻意保留的不对称）。
    SetCells {
        range: RangeRef,
        cells: Vec<Vec<Cell>>,
    },
    Noop,
}

impl Op {
    /// 外部操作名
    pub fn name(&self) -> &'static str {
        match self {
            Op::CreateSheet { .. } => "createSheet",
            Op::DeleteSheet { .. } => "deleteSheet",
            Op::RestoreSheet { .. } => "restoreSheet",
            Op::SetValues { .. } => "setValues",
            Op::SetFormulas { .. } => "setFormulas",
            Op::FormatRange { .. } => "formatRange",
            Op::LinkProvenance { .. } => "linkProvenance",
            Op::SetCells { .. } => "setCells",
            Op::Noop => "noop",
        }
    }

    /// 是否仅限内部（逆操作回放）使用
    pub fn is_internal(&self) -> bool {
        matches!(self, Op::RestoreSheet { .. } | Op::SetCells { .. } | Op::Noop)
    }

    /// 人类可读摘要（事件日志对外只暴露摘要，不暴露原始参数）
    pub fn summary(&self) -> String {
        match self {
            Op::CreateSheet { name } => format!("createSheet {}", name),
            Op::DeleteSheet { name } => format!("deleteSheet {}", name),
            Op::RestoreSheet { sheet } => format!("restoreSheet {}", sheet.name),
            Op::SetValues { range, .. } => format!("setValues {}", range.label()),
            Op::SetFormulas { range, .. } => format!("setFormulas {}", range.label()),
            Op::FormatRange { range, format } => match format {
                Some(f) => format!("formatRange {} {:?}", range.label(), f),
                None => format!("formatRange {} clear", range.label()),
            },
            Op::LinkProvenance { range, .. } => format!("linkProvenance {}", range.label()),
            Op::SetCells { range, .. } => format!("setCells {}", range.label()),
            Op::Noop => "noop".to_string(),
        }
    }
}

/// 事件：一次已应用的操作 + 应用时刻计算出的逆操作
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: String,
    /// Unix 毫秒时间戳
    pub ts: i64,
    pub op: Op,
    pub inverse: Op,
    pub summary: String,
}

impl Event {
    pub fn new(op: Op, inverse: Op) -> Self {
        let summary = op.summary();
        Self {
            id: Uuid::new_v4().to_string(),
            ts: Utc::now().timestamp_millis(),
            op,
            inverse,
            summary,
        }
    }
}

/// 检查点：命名的事件日志长度标记（不是内容快照）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub name: String,
    pub event_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn op_decodes_from_tagged_json() {
        let op: Op = serde_json::from_value(json!({
            "op": "setValues",
            "range": {"sheet": "S", "r1": 0, "c1": 0, "r2": 1, "c2": 1},
            "values": [[1.0, "x"], [null, 2.0]],
        }))
        .unwrap();
        match op {
            Op::SetValues { range, values, provenance } => {
                assert_eq!(range.label(), "S!A1:B2");
                assert_eq!(values[0][1], CellValue::Text("x".to_string()));
                assert_eq!(values[1][0], CellValue::Empty);
                assert!(provenance.is_none());
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn op_rejects_unknown_tag() {
        let res: Result<Op, _> =
            serde_json::from_value(json!({"op": "dropTable", "name": "S"}));
        assert!(res.is_err());
    }

    #[test]
    fn internal_ops_are_flagged() {
        assert!(Op::Noop.is_internal());
        assert!(!Op::CreateSheet { name: "S".into() }.is_internal());
    }
}
