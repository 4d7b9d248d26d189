//! 文档摄取边界：解析后的财务报表 → 工作表
//!
//! 上游协作方产出三张命名报表（利润表 / 资产负债表 / 现金流量表），
//! 本模块只做一段固定的 createSheet + setValues 调用序列：每张报表
//! 一行表头加逐行科目，每格带上来源文档的溯源记录。不引入任何
//! 引擎之外的新能力。

use serde::{Deserialize, Serialize};

use crate::core::SheetError;
use crate::model::{CellValue, Op, Provenance, RangeRef, SheetModel};

/// 单条科目：名称 + 各期数值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub name: String,
    pub values: Vec<f64>,
}

/// 单张报表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub title: String,
    pub periods: Vec<String>,
    pub lines: Vec<Line>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// 解析后的整份文档：三张命名报表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedStatements {
    pub income: Statement,
    pub balance: Statement,
    pub cashflow: Statement,
}

/// 把三张报表落成三张工作表。表已存在等结构性错误原样上抛，
/// 已落的表保留（与计划执行同样的部分成功语义）。
pub fn populate(
    model: &mut SheetModel,
    doc: &ParsedStatements,
    doc_id: &str,
) -> Result<(), SheetError> {
    for statement in [&doc.income, &doc.balance, &doc.cashflow] {
        populate_statement(model, statement, doc_id)?;
    }
    Ok(())
}

fn populate_statement(
    model: &mut SheetModel,
    statement: &Statement,
    doc_id: &str,
) -> Result<(), SheetError> {
    let sheet = statement.title.clone();
    model.dispatch(Op::CreateSheet {
        name: sheet.clone(),
    })?;

    let cols = statement.periods.len();

    // 表头：首格放报表标题，其后各期标签
    let mut header: Vec<CellValue> = Vec::with_capacity(cols + 1);
    header.push(CellValue::Text(statement.title.clone()));
    header.extend(
        statement
            .periods
            .iter()
            .map(|p| CellValue::Text(p.clone())),
    );
    model.dispatch(Op::SetValues {
        range: RangeRef::new(&sheet, 0, 0, 0, cols),
        values: vec![header],
        provenance: Some(Provenance::new(doc_id)),
    })?;

    // 每条科目一行：名称 + 数值
    for (i, line) in statement.lines.iter().enumerate() {
        let mut row: Vec<CellValue> = Vec::with_capacity(line.values.len() + 1);
        row.push(CellValue::Text(line.name.clone()));
        row.extend(line.values.iter().map(|v| CellValue::Number(*v)));
        model.dispatch(Op::SetValues {
            range: RangeRef::new(&sheet, i + 1, 0, i + 1, line.values.len()),
            values: vec![row],
            provenance: Some(Provenance {
                doc_id: doc_id.to_string(),
                snippet: Some(line.name.clone()),
                rationale: None,
            }),
        })?;
    }

    tracing::info!(sheet = %sheet, lines = statement.lines.len(), "statement populated");
    Ok(())
}
