//! 工作簿摘要：发给模型的是有界摘要而非整簿
//!
//! 每张表给出行列数、首行表头、A 列标签（封顶）与左上角预览窗口，
//! prompt 体积与工作簿大小解耦。

use crate::config::AgentSection;
use crate::model::{Cell, CellValue, Workbook};

/// 构建全簿摘要（行数 / 列数 / 表头 / A 列标签 / 预览窗口）
pub fn summarize(workbook: &Workbook, caps: &AgentSection) -> String {
    let mut out = String::new();
    for sheet in workbook.sheets.values() {
        let rows = sheet.rows.len();
        let cols = sheet.col_count();
        out.push_str(&format!("Sheet \"{}\": {} rows x {} cols\n", sheet.name, rows, cols));

        if let Some(first_row) = sheet.rows.first() {
            let headers: Vec<String> = first_row
                .iter()
                .take(caps.preview_cols)
                .map(display_text)
                .collect();
            if headers.iter().any(|h| !h.is_empty()) {
                out.push_str(&format!("  headers: {}\n", headers.join(" | ")));
            }
        }

        let labels: Vec<String> = sheet
            .rows
            .iter()
            .take(caps.label_cap)
            .map(|row| row.first().map(display_text).unwrap_or_default())
            .filter(|l| !l.is_empty())
            .collect();
        if !labels.is_empty() {
            out.push_str(&format!("  column A: {}\n", labels.join(", ")));
        }

        for (r, row) in sheet.rows.iter().take(caps.preview_rows).enumerate() {
            let cells: Vec<String> = row
                .iter()
                .take(caps.preview_cols)
                .map(display_text)
                .collect();
            out.push_str(&format!("  row {}: [{}]\n", r + 1, cells.join(", ")));
        }
    }
    if out.is_empty() {
        out.push_str("(empty workbook)\n");
    }
    out
}

fn display_text(cell: &Cell) -> String {
    if let Some(formula) = &cell.formula {
        return formula.clone();
    }
    match &cell.value {
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => format!("{}", n),
        CellValue::Empty => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentSection;
    use crate::model::{Op, RangeRef, SheetModel, DEFAULT_SHEET};

    #[test]
    fn summary_is_bounded_by_caps() {
        let mut model = SheetModel::new();
        // 100 行数据，远超预览窗口
        let values: Vec<Vec<CellValue>> = (0..100)
            .map(|i| vec![CellValue::Text(format!("label{}", i)), CellValue::Number(i as f64)])
            .collect();
        model
            .dispatch(Op::SetValues {
                range: RangeRef::new(DEFAULT_SHEET, 0, 0, 99, 1),
                values,
                provenance: None,
            })
            .unwrap();

        let caps = AgentSection::default();
        let summary = summarize(model.workbook(), &caps);

        assert!(summary.contains("100 rows x 2 cols"));
        assert!(summary.contains("label0"));
        assert!(summary.contains(&format!("label{}", caps.label_cap - 1)));
        assert!(!summary.contains(&format!("label{}", caps.label_cap)));
        assert!(summary.contains("row 8:"));
        assert!(!summary.contains("row 9:"));
    }

    #[test]
    fn empty_workbook_summary() {
        let model = SheetModel::new();
        let summary = summarize(model.workbook(), &AgentSection::default());
        assert!(summary.contains("Sheet \"Sheet1\": 0 rows x 0 cols"));
    }

    #[test]
    fn formulas_shown_as_text_in_preview() {
        let mut model = SheetModel::new();
        model
            .dispatch(Op::SetFormulas {
                range: RangeRef::cell(DEFAULT_SHEET, 0, 0),
                formulas: vec![vec![Some("=SUM(A2:A9)".into())]],
            })
            .unwrap();
        let summary = summarize(model.workbook(), &AgentSection::default());
        assert!(summary.contains("=SUM(A2:A9)"));
    }
}
