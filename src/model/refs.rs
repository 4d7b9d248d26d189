//! 单元格引用：A1 记法与零基坐标的双向转换，以及矩形范围 RangeRef
//!
//! 列号按 26 进制字母（0 → A，25 → Z，26 → AA），行号一基显示、零基存储。
//! RangeRef 的 r1≤r2 / c1≤c2 由调用方保证，引擎只负责按需扩容、从不校验次序。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::SheetError;

fn a1_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z]+)([0-9]+)$").unwrap())
}

/// 零基坐标 → A1 记法（rc_to_a1(0, 0) = "A1"，rc_to_a1(0, 26) = "AA1"）
pub fn rc_to_a1(row: usize, col: usize) -> String {
    let mut letters = String::new();
    let mut n = col as u64 + 1;
    while n > 0 {
        n -= 1;
        letters.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    format!("{}{}", letters, row + 1)
}

/// A1 记法 → 零基 (row, col)；rc_to_a1 的严格左逆
pub fn a1_to_rc(reference: &str) -> Result<(usize, usize), SheetError> {
    let caps = a1_regex()
        .captures(reference.trim())
        .ok_or_else(|| SheetError::BadRef(reference.to_string()))?;

    let mut col: usize = 0;
    for b in caps[1].to_ascii_uppercase().bytes() {
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add((b - b'A') as usize + 1))
            .ok_or_else(|| SheetError::BadRef(reference.to_string()))?;
    }
    let row = caps[2]
        .parse::<usize>()
        .ok()
        .and_then(|r| r.checked_sub(1))
        .ok_or_else(|| SheetError::BadRef(reference.to_string()))?;

    Ok((row, col - 1))
}

/// 闭区间矩形范围：表名 + 零基 (r1,c1)-(r2,c2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRef {
    pub sheet: String,
    pub r1: usize,
    pub c1: usize,
    pub r2: usize,
    pub c2: usize,
}

impl RangeRef {
    pub fn new(sheet: impl Into<String>, r1: usize, c1: usize, r2: usize, c2: usize) -> Self {
        Self {
            sheet: sheet.into(),
            r1,
            c1,
            r2,
            c2,
        }
    }

    /// 单个单元格的退化范围
    pub fn cell(sheet: impl Into<String>, row: usize, col: usize) -> Self {
        Self::new(sheet, row, col, row, col)
    }

    pub fn height(&self) -> usize {
        self.r2 - self.r1 + 1
    }

    pub fn width(&self) -> usize {
        self.c2 - self.c1 + 1
    }

    /// "Sheet1!A1:B2" 形式的摘要（单格退化为 "Sheet1!A1"）
    pub fn label(&self) -> String {
        if self.r1 == self.r2 && self.c1 == self.c2 {
            format!("{}!{}", self.sheet, rc_to_a1(self.r1, self.c1))
        } else {
            format!(
                "{}!{}:{}",
                self.sheet,
                rc_to_a1(self.r1, self.c1),
                rc_to_a1(self.r2, self.c2)
            )
        }
    }
}
