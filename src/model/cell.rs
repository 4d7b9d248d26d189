//! 单元格：字面值、公式、显示格式与数据溯源
//!
//! 字面值与公式互斥：写入一方即清除另一方。溯源记录只追加、不覆盖。

use serde::{Deserialize, Serialize};

/// 单元格字面值：数字 / 文本 / 空（JSON null ↔ Empty）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    /// 求和 / 引用替换场景下的数字强制转换：非数字与空一律为 0。
    /// 文本先剥掉千分位逗号再尝试解析（"1,234" → 1234）。
    pub fn coerce_number(&self) -> f64 {
        match self {
            CellValue::Number(n) => *n,
            CellValue::Text(s) => s.replace(',', "").trim().parse::<f64>().unwrap_or(0.0),
            CellValue::Empty => 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// 显示格式标签（固定枚举集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellFormat {
    Percent,
    Currency,
    Number,
    Text,
}

/// 溯源记录：来源文档 + 可选摘录 / 依据说明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub doc_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Provenance {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            snippet: None,
            rationale: None,
        }
    }
}

/// 单元格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<CellFormat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<Provenance>,
}

impl Cell {
    /// 写入字面值，清除公式
    pub fn set_literal(&mut self, value: CellValue) {
        self.value = value;
        self.formula = None;
    }

    /// 写入公式（None 表示清除公式），清除字面值
    pub fn set_formula(&mut self, formula: Option<String>) {
        self.formula = formula;
        self.value = CellValue::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_formula_are_exclusive() {
        let mut cell = Cell::default();
        cell.set_formula(Some("=A1+1".to_string()));
        cell.set_literal(CellValue::Number(3.0));
        assert_eq!(cell.formula, None);
        assert_eq!(cell.value, CellValue::Number(3.0));

        cell.set_formula(Some("=B2".to_string()));
        assert!(cell.value.is_empty());
    }

    #[test]
    fn coerce_number_strips_thousands_separators() {
        assert_eq!(CellValue::Text("1,234.5".to_string()).coerce_number(), 1234.5);
        assert_eq!(CellValue::Text("abc".to_string()).coerce_number(), 0.0);
        assert_eq!(CellValue::Empty.coerce_number(), 0.0);
    }

    #[test]
    fn cell_value_serde_uses_null_for_empty() {
        assert_eq!(serde_json::to_string(&CellValue::Empty).unwrap(), "null");
        assert_eq!(
            serde_json::from_str::<CellValue>("null").unwrap(),
            CellValue::Empty
        );
        assert_eq!(
            serde_json::from_str::<CellValue>("2.5").unwrap(),
            CellValue::Number(2.5)
        );
    }
}
