//! SheetModel：状态引擎唯一入口
//!
//! 封闭操作集 + 前像快照逆操作 + 追加式事件日志。所有变更走 dispatch：
//! 先定位工作表，再 ensure_size 扩容（先于一切写入、幂等），再快照前像，
//! 再落写，最后追加一条事件。任何操作的 undo 代价都是 O(范围大小)，
//! 结构操作（createSheet / deleteSheet / restoreSheet）之外无需定制逆逻辑。
//!
//! undo 弹出最近事件并以内部模式回放其逆（内部回放不记日志，否则重复
//! undo 会在 setCells 的 noop 逆上原地打转，永远回不到更早的历史）。
//! undo 不触发重算，调用方需自行 evaluate_all。

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::SheetError;
use crate::eval::{self, EvalResults};

use super::cell::{Cell, CellValue};
use super::ops::{Checkpoint, Event, Op};
use super::refs::{a1_to_rc, RangeRef};
use super::sheet::Sheet;

/// 新建工作簿的默认工作表名
pub const DEFAULT_SHEET: &str = "Sheet1";

/// 工作簿：表集合 + 事件日志 + 检查点
#[derive(Debug, Clone)]
pub struct Workbook {
    pub id: String,
    pub sheets: BTreeMap<String, Sheet>,
    pub events: Vec<Event>,
    pub checkpoints: Vec<Checkpoint>,
}

/// 外部载入结构：{sheets: [{name, rows: [[{value}]]}]}
#[derive(Debug, Clone, Deserialize)]
pub struct WorkbookInput {
    pub sheets: Vec<SheetInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetInput {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<CellInput>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellInput {
    #[serde(default)]
    pub value: CellValue,
}

/// 状态引擎门面：独占持有 Workbook，外部以句柄传递（无全局单例）
pub struct SheetModel {
    workbook: Workbook,
    /// 最近一次 evaluate_all 的结果；任何 dispatch 都会使其失效
    eval_cache: Option<EvalResults>,
}

impl Default for SheetModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetModel {
    /// 一张默认空表 + 初始检查点
    pub fn new() -> Self {
        let mut sheets = BTreeMap::new();
        sheets.insert(DEFAULT_SHEET.to_string(), Sheet::new(DEFAULT_SHEET));
        let mut model = Self {
            workbook: Workbook {
                id: Uuid::new_v4().to_string(),
                sheets,
                events: Vec::new(),
                checkpoints: Vec::new(),
            },
            eval_cache: None,
        };
        model.checkpoint("init");
        model
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// 外部变更入口：内部专用操作（restoreSheet / setCells / noop）一律拒收
    pub fn dispatch(&mut self, op: Op) -> Result<(), SheetError> {
        if op.is_internal() {
            return Err(SheetError::UnknownOp(op.name().to_string()));
        }
        self.apply(op, true)
    }

    /// 内部变更入口（逆操作回放）：全词汇表可用，不记日志
    fn dispatch_internal(&mut self, op: Op) -> Result<(), SheetError> {
        self.apply(op, false)
    }

    fn apply(&mut self, op: Op, log: bool) -> Result<(), SheetError> {
        let inverse = match &op {
            Op::CreateSheet { name } => {
                if self.workbook.sheets.contains_key(name) {
                    return Err(SheetError::DuplicateSheet(name.clone()));
                }
                self.workbook
                    .sheets
                    .insert(name.clone(), Sheet::new(name.clone()));
                Op::DeleteSheet { name: name.clone() }
            }
            Op::DeleteSheet { name } => {
                let sheet = self
                    .workbook
                    .sheets
                    .remove(name)
                    .ok_or_else(|| SheetError::UnknownSheet(name.clone()))?;
                Op::RestoreSheet { sheet }
            }
            Op::RestoreSheet { sheet } => {
                // 同名覆盖
                self.workbook
                    .sheets
                    .insert(sheet.name.clone(), sheet.clone());
                Op::DeleteSheet {
                    name: sheet.name.clone(),
                }
            }
            Op::SetValues {
                range,
                values,
                provenance,
            } => {
                let pre = self.prepare(range)?;
                let sheet = self.sheet_mut(&range.sheet)?;
                for (i, r) in (range.r1..=range.r2).enumerate() {
                    for (j, c) in (range.c1..=range.c2).enumerate() {
                        let v = values
                            .get(i)
                            .and_then(|row| row.get(j))
                            .cloned()
                            .unwrap_or_default();
                        if let Some(cell) = sheet.cell_mut(r, c) {
                            cell.set_literal(v);
                            if let Some(p) = provenance {
                                cell.provenance.push(p.clone());
                            }
                        }
                    }
                }
                Op::SetCells {
                    range: range.clone(),
                    cells: pre,
                }
            }
            Op::SetFormulas { range, formulas } => {
                let pre = self.prepare(range)?;
                let sheet = self.sheet_mut(&range.sheet)?;
                for (i, r) in (range.r1..=range.r2).enumerate() {
                    for (j, c) in (range.c1..=range.c2).enumerate() {
                        let f = formulas.get(i).and_then(|row| row.get(j)).cloned().flatten();
                        if let Some(cell) = sheet.cell_mut(r, c) {
                            cell.set_formula(f);
                        }
                    }
                }
                Op::SetCells {
                    range: range.clone(),
                    cells: pre,
                }
            }
            Op::FormatRange { range, format } => {
                let pre = self.prepare(range)?;
                let sheet = self.sheet_mut(&range.sheet)?;
                for r in range.r1..=range.r2 {
                    for c in range.c1..=range.c2 {
                        if let Some(cell) = sheet.cell_mut(r, c) {
                            cell.format = *format;
                        }
                    }
                }
                Op::SetCells {
                    range: range.clone(),
                    cells: pre,
                }
            }
            Op::LinkProvenance { range, provenance } => {
                let pre = self.prepare(range)?;
                let sheet = self.sheet_mut(&range.sheet)?;
                for r in range.r1..=range.r2 {
                    for c in range.c1..=range.c2 {
                        if let Some(cell) = sheet.cell_mut(r, c) {
                            cell.provenance.extend(provenance.iter().cloned());
                        }
                    }
                }
                Op::SetCells {
                    range: range.clone(),
                    cells: pre,
                }
            }
            Op::SetCells { range, cells } => {
                self.prepare(range)?;
                let sheet = self.sheet_mut(&range.sheet)?;
                for (i, r) in (range.r1..=range.r2).enumerate() {
                    for (j, c) in (range.c1..=range.c2).enumerate() {
                        let restored = cells
                            .get(i)
                            .and_then(|row| row.get(j))
                            .cloned()
                            .unwrap_or_default();
                        if let Some(cell) = sheet.cell_mut(r, c) {
                            *cell = restored;
                        }
                    }
                }
                Op::Noop
            }
            Op::Noop => Op::Noop,
        };

        self.eval_cache = None;
        if log {
            let event = Event::new(op, inverse);
            tracing::debug!(op = %event.summary, "dispatch");
            self.workbook.events.push(event);
        }
        Ok(())
    }

    /// 弹出最近事件并回放其逆；历史为空时返回 None。不触发重算。
    pub fn undo(&mut self) -> Result<Option<Event>, SheetError> {
        let Some(event) = self.workbook.events.pop() else {
            return Ok(None);
        };
        self.dispatch_internal(event.inverse.clone())?;
        tracing::debug!(op = %event.summary, "undo");
        Ok(Some(event))
    }

    /// 记录命名检查点（事件日志长度标记）
    pub fn checkpoint(&mut self, name: impl Into<String>) -> Checkpoint {
        let cp = Checkpoint {
            name: name.into(),
            event_len: self.workbook.events.len(),
        };
        self.workbook.checkpoints.push(cp.clone());
        cp
    }

    /// 全量重算并缓存结果；这是求值结果对读取端可见的唯一途径
    pub fn evaluate_all(&mut self) {
        self.eval_cache = Some(eval::evaluate_all(&self.workbook));
    }

    /// 硬重置：整套工作表替换，历史与检查点清空，留下唯一的 "import" 检查点
    pub fn load(&mut self, input: WorkbookInput) {
        self.workbook.sheets.clear();
        for sheet_in in input.sheets {
            let mut sheet = Sheet::new(sheet_in.name.clone());
            sheet.rows = sheet_in
                .rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|c| Cell {
                            value: c.value,
                            ..Cell::default()
                        })
                        .collect()
                })
                .collect();
            self.workbook.sheets.insert(sheet_in.name, sheet);
        }
        self.workbook.events.clear();
        self.workbook.checkpoints.clear();
        self.eval_cache = None;
        self.checkpoint("import");
        tracing::info!(sheets = self.workbook.sheets.len(), "workbook loaded");
    }

    /// 指定单元格（一基 A1 引用）的溯源列表
    pub fn provenance_at(&self, sheet: &str, reference: &str) -> Result<Vec<super::cell::Provenance>, SheetError> {
        let (row, col) = a1_to_rc(reference)?;
        let sheet = self
            .workbook
            .sheets
            .get(sheet)
            .ok_or_else(|| SheetError::UnknownSheet(sheet.to_string()))?;
        Ok(sheet
            .cell(row, col)
            .map(|c| c.provenance.clone())
            .unwrap_or_default())
    }

    /// 只读 JSON 投影：事件只暴露摘要，公式格显示最近一次重算的值
    pub fn to_json(&self) -> serde_json::Value {
        let sheets: Vec<_> = self
            .workbook
            .sheets
            .values()
            .map(|sheet| {
                let rows: Vec<Vec<_>> = sheet
                    .rows
                    .iter()
                    .enumerate()
                    .map(|(r, row)| {
                        row.iter()
                            .enumerate()
                            .map(|(c, cell)| {
                                let value = self.displayed_value(&sheet.name, r, c, cell);
                                json!({
                                    "value": value,
                                    "formula": cell.formula,
                                    "format": cell.format,
                                })
                            })
                            .collect()
                    })
                    .collect();
                json!({"name": sheet.name, "rows": rows})
            })
            .collect();

        json!({
            "id": self.workbook.id,
            "sheets": sheets,
            "checkpoints": self.workbook.checkpoints,
            "events": self
                .workbook
                .events
                .iter()
                .map(|e| json!({"id": e.id, "ts": e.ts, "op": e.op.name(), "summary": e.summary}))
                .collect::<Vec<_>>(),
        })
    }

    fn displayed_value(&self, sheet: &str, row: usize, col: usize, cell: &Cell) -> CellValue {
        if cell.formula.is_some() {
            if let Some(cache) = &self.eval_cache {
                if let Some(v) = cache.get(&(sheet.to_string(), row, col)) {
                    return v.clone();
                }
            }
        }
        cell.value.clone()
    }

    fn prepare(&mut self, range: &RangeRef) -> Result<Vec<Vec<Cell>>, SheetError> {
        let sheet = self.sheet_mut(&range.sheet)?;
        sheet.ensure_size(range.r2 + 1, range.c2 + 1);
        Ok(sheet.snapshot(range))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet, SheetError> {
        self.workbook
            .sheets
            .get_mut(name)
            .ok_or_else(|| SheetError::UnknownSheet(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::cell::{CellFormat, Provenance};

    fn set_values(model: &mut SheetModel, range: RangeRef, values: Vec<Vec<CellValue>>) {
        model
            .dispatch(Op::SetValues {
                range,
                values,
                provenance: None,
            })
            .unwrap();
    }

    fn num(n: f64) -> CellValue {
        CellValue::Number(n)
    }

    #[test]
    fn new_model_has_default_sheet_and_init_checkpoint() {
        let model = SheetModel::new();
        assert!(model.workbook().sheets.contains_key(DEFAULT_SHEET));
        assert_eq!(model.workbook().checkpoints.len(), 1);
        assert_eq!(model.workbook().checkpoints[0].name, "init");
        assert_eq!(model.workbook().checkpoints[0].event_len, 0);
    }

    #[test]
    fn create_sheet_rejects_duplicates() {
        let mut model = SheetModel::new();
        model.dispatch(Op::CreateSheet { name: "P&L".into() }).unwrap();
        let err = model
            .dispatch(Op::CreateSheet { name: "P&L".into() })
            .unwrap_err();
        assert!(matches!(err, SheetError::DuplicateSheet(_)));
    }

    #[test]
    fn external_dispatch_rejects_internal_ops() {
        let mut model = SheetModel::new();
        let err = model.dispatch(Op::Noop).unwrap_err();
        assert!(matches!(err, SheetError::UnknownOp(_)));
        let err = model
            .dispatch(Op::SetCells {
                range: RangeRef::cell(DEFAULT_SHEET, 0, 0),
                cells: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, SheetError::UnknownOp(_)));
    }

    #[test]
    fn set_values_clears_formulas_only_inside_range() {
        let mut model = SheetModel::new();
        // 2x2 范围内预置公式，范围外 C3 预置另一条
        model
            .dispatch(Op::SetFormulas {
                range: RangeRef::new(DEFAULT_SHEET, 0, 0, 2, 2),
                formulas: vec![
                    vec![Some("=1+1".into()), Some("=1+1".into()), Some("=1+1".into())],
                    vec![Some("=1+1".into()), Some("=1+1".into()), Some("=1+1".into())],
                    vec![Some("=1+1".into()), Some("=1+1".into()), Some("=2+2".into())],
                ],
            })
            .unwrap();

        set_values(
            &mut model,
            RangeRef::new(DEFAULT_SHEET, 0, 0, 1, 1),
            vec![vec![num(1.0), num(2.0)], vec![num(3.0), num(4.0)]],
        );

        let sheet = &model.workbook().sheets[DEFAULT_SHEET];
        for r in 0..2 {
            for c in 0..2 {
                let cell = sheet.cell(r, c).unwrap();
                assert_eq!(cell.formula, None, "formula left behind at ({},{})", r, c);
            }
        }
        assert_eq!(sheet.cell(2, 2).unwrap().formula.as_deref(), Some("=2+2"));
        assert_eq!(sheet.cell(0, 2).unwrap().formula.as_deref(), Some("=1+1"));
    }

    #[test]
    fn undo_round_trips_to_checkpoint() {
        let mut model = SheetModel::new();
        set_values(
            &mut model,
            RangeRef::cell(DEFAULT_SHEET, 0, 0),
            vec![vec![num(1.0)]],
        );
        model
            .dispatch(Op::FormatRange {
                range: RangeRef::cell(DEFAULT_SHEET, 0, 0),
                format: Some(CellFormat::Currency),
            })
            .unwrap();
        let cp = model.checkpoint("before-edits");
        // 网格只增不减：以固定范围快照比较内容（snapshot 对缺失格补空）
        let window = RangeRef::new(DEFAULT_SHEET, 0, 0, 2, 1);
        let baseline = model.workbook().sheets[DEFAULT_SHEET].snapshot(&window);

        // 检查点之后的三次修改：值、公式、溯源
        set_values(
            &mut model,
            RangeRef::new(DEFAULT_SHEET, 0, 0, 1, 1),
            vec![vec![num(9.0), num(8.0)], vec![num(7.0), num(6.0)]],
        );
        model
            .dispatch(Op::SetFormulas {
                range: RangeRef::cell(DEFAULT_SHEET, 2, 0),
                formulas: vec![vec![Some("=A1+A2".into())]],
            })
            .unwrap();
        model
            .dispatch(Op::LinkProvenance {
                range: RangeRef::cell(DEFAULT_SHEET, 0, 0),
                provenance: vec![Provenance::new("doc-1")],
            })
            .unwrap();

        while model.workbook().events.len() > cp.event_len {
            model.undo().unwrap();
        }
        assert_eq!(model.workbook().events.len(), cp.event_len);
        assert_eq!(
            model.workbook().sheets[DEFAULT_SHEET].snapshot(&window),
            baseline
        );
    }

    #[test]
    fn undo_restores_deleted_sheet_with_contents() {
        let mut model = SheetModel::new();
        model.dispatch(Op::CreateSheet { name: "Data".into() }).unwrap();
        set_values(
            &mut model,
            RangeRef::cell("Data", 0, 0),
            vec![vec![CellValue::Text("hello".into())]],
        );
        model.dispatch(Op::DeleteSheet { name: "Data".into() }).unwrap();
        assert!(!model.workbook().sheets.contains_key("Data"));

        let popped = model.undo().unwrap().unwrap();
        assert_eq!(popped.op.name(), "deleteSheet");
        assert_eq!(
            model.workbook().sheets["Data"].cell(0, 0).unwrap().value,
            CellValue::Text("hello".into())
        );
    }

    #[test]
    fn undo_on_empty_history_returns_none() {
        let mut model = SheetModel::new();
        assert!(model.undo().unwrap().is_none());
    }

    #[test]
    fn provenance_query_by_a1_reference() {
        let mut model = SheetModel::new();
        model
            .dispatch(Op::SetValues {
                range: RangeRef::cell(DEFAULT_SHEET, 6, 1),
                values: vec![vec![num(42.0)]],
                provenance: Some(Provenance {
                    doc_id: "10-K".into(),
                    snippet: Some("Net revenue".into()),
                    rationale: None,
                }),
            })
            .unwrap();

        let provenance = model.provenance_at(DEFAULT_SHEET, "B7").unwrap();
        assert_eq!(provenance.len(), 1);
        assert_eq!(provenance[0].doc_id, "10-K");

        assert!(model.provenance_at(DEFAULT_SHEET, "A1").unwrap().is_empty());
        assert!(model.provenance_at("Nope", "A1").is_err());
        assert!(model.provenance_at(DEFAULT_SHEET, "!!").is_err());
    }

    #[test]
    fn link_provenance_appends_not_replaces() {
        let mut model = SheetModel::new();
        let range = RangeRef::cell(DEFAULT_SHEET, 0, 0);
        model
            .dispatch(Op::LinkProvenance {
                range: range.clone(),
                provenance: vec![Provenance::new("a")],
            })
            .unwrap();
        model
            .dispatch(Op::LinkProvenance {
                range,
                provenance: vec![Provenance::new("b")],
            })
            .unwrap();
        let provenance = model.provenance_at(DEFAULT_SHEET, "A1").unwrap();
        assert_eq!(provenance.len(), 2);
    }

    #[test]
    fn load_is_a_hard_reset() {
        let mut model = SheetModel::new();
        set_values(
            &mut model,
            RangeRef::cell(DEFAULT_SHEET, 0, 0),
            vec![vec![num(1.0)]],
        );
        model.checkpoint("work");

        let input: WorkbookInput = serde_json::from_value(serde_json::json!({
            "sheets": [{"name": "Imported", "rows": [[{"value": "x"}, {"value": 2.0}]]}]
        }))
        .unwrap();
        model.load(input);

        assert_eq!(model.workbook().sheets.len(), 1);
        assert!(model.workbook().sheets.contains_key("Imported"));
        assert!(model.workbook().events.is_empty());
        assert_eq!(model.workbook().checkpoints.len(), 1);
        assert_eq!(model.workbook().checkpoints[0].name, "import");
    }

    #[test]
    fn projection_summarizes_events_without_arguments() {
        let mut model = SheetModel::new();
        set_values(
            &mut model,
            RangeRef::cell(DEFAULT_SHEET, 0, 0),
            vec![vec![num(5.0)]],
        );
        let projection = model.to_json();
        let events = projection["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["op"], "setValues");
        assert!(events[0].get("args").is_none());
        assert_eq!(events[0]["summary"], "setValues Sheet1!A1");
    }
}
