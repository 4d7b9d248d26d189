//! 工作表：按行存储的单元格网格
//!
//! 网格只增不减：ensure_size 把行数与被触及行的列数补齐到目标尺寸，
//! 缺失单元格以空值补位。允许参差行宽（未被触及的行不强行加宽）。

use serde::{Deserialize, Serialize};

use super::cell::Cell;
use super::refs::RangeRef;

/// 单张工作表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// 补齐到至少 rows 行，前 rows 行至少 cols 列。幂等，只增不减。
    pub fn ensure_size(&mut self, rows: usize, cols: usize) {
        while self.rows.len() < rows {
            self.rows.push(Vec::new());
        }
        for row in self.rows.iter_mut().take(rows) {
            if row.len() < cols {
                row.resize_with(cols, Cell::default);
            }
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        self.rows.get_mut(row).and_then(|r| r.get_mut(col))
    }

    /// 范围前像快照（调用前需 ensure_size 覆盖该范围）
    pub fn snapshot(&self, range: &RangeRef) -> Vec<Vec<Cell>> {
        (range.r1..=range.r2)
            .map(|r| {
                (range.c1..=range.c2)
                    .map(|c| self.cell(r, c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// 当前最大列数（用于摘要展示）
    pub fn col_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::cell::CellValue;

    #[test]
    fn ensure_size_grows_and_never_shrinks() {
        let mut sheet = Sheet::new("S");
        sheet.ensure_size(3, 2);
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].len(), 2);

        sheet.ensure_size(1, 1);
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].len(), 2);

        // 幂等
        sheet.ensure_size(3, 2);
        assert_eq!(sheet.rows.len(), 3);
    }

    #[test]
    fn snapshot_clones_range_contents() {
        let mut sheet = Sheet::new("S");
        sheet.ensure_size(2, 2);
        sheet.cell_mut(0, 0).unwrap().set_literal(CellValue::Number(1.0));

        let range = RangeRef::new("S", 0, 0, 1, 1);
        let snap = sheet.snapshot(&range);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0][0].value, CellValue::Number(1.0));

        sheet.cell_mut(0, 0).unwrap().set_literal(CellValue::Number(9.0));
        assert_eq!(snap[0][0].value, CellValue::Number(1.0));
    }
}
