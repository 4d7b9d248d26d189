//! 公式求值器
//!
//! (workbook, sheet, row, col) → 值的纯函数，从不修改状态。流程：
//! 先把 SUM(...) 调用重写为数字（参数支持单元格引用、A1:B2 范围与数字
//! 字面量，范围按行主序递归求和），再把裸引用 Token 替换为递归求得的
//! 数值，最后交给 expr 的递归下降解析器。循环引用通过随调用链下传的
//! visited 集合检出，命中返回 #REF!；表达式失败返回 #ERROR!。两者都编码
//! 为单元格值，单条坏公式不会中断整簿重算。
//!
//! 求值只在显式调用 evaluate_all 时发生，写入不会自动触发。

pub mod expr;

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::model::cell::CellValue;
use crate::model::engine::Workbook;
use crate::model::refs::a1_to_rc;

/// 循环引用哨兵值
pub const REF_ERROR: &str = "#REF!";
/// 表达式求值失败哨兵值
pub const EVAL_ERROR: &str = "#ERROR!";

/// 一次 evaluate_all 的结果：(表名, 行, 列) → 解析后的值
pub type EvalResults = HashMap<(String, usize, usize), CellValue>;

type Visited = HashSet<(String, usize, usize)>;

fn sum_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)SUM\(([^()]*)\)").unwrap())
}

fn ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z]+[0-9]+)\b").unwrap())
}

fn range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z]+[0-9]+):([A-Za-z]+[0-9]+)$").unwrap())
}

/// 对每个现存单元格求值恰好一次。幂等：无中间写入时重复调用结果相同。
pub fn evaluate_all(workbook: &Workbook) -> EvalResults {
    let mut results = EvalResults::new();
    for (name, sheet) in &workbook.sheets {
        for r in 0..sheet.rows.len() {
            for c in 0..sheet.rows[r].len() {
                let mut visited = Visited::new();
                let value = evaluate_cell(workbook, name, r, c, &mut visited);
                results.insert((name.clone(), r, c), value);
            }
        }
    }
    results
}

/// 求单个单元格的显示值。visited 为本次顶层求值私有，绝不跨顶层调用共享。
pub fn evaluate_cell(
    workbook: &Workbook,
    sheet: &str,
    row: usize,
    col: usize,
    visited: &mut Visited,
) -> CellValue {
    let key = (sheet.to_string(), row, col);
    if visited.contains(&key) {
        return CellValue::Text(REF_ERROR.to_string());
    }

    let Some(cell) = workbook.sheets.get(sheet).and_then(|s| s.cell(row, col)) else {
        return CellValue::Empty;
    };
    let Some(formula) = &cell.formula else {
        return cell.value.clone();
    };
    // 无 '=' 前缀按字面文本处理
    let Some(body) = formula.strip_prefix('=') else {
        return CellValue::Text(formula.clone());
    };

    visited.insert(key.clone());
    let result = evaluate_body(workbook, sheet, body, visited);
    visited.remove(&key);
    result
}

fn evaluate_body(
    workbook: &Workbook,
    sheet: &str,
    body: &str,
    visited: &mut Visited,
) -> CellValue {
    let mut text = body.to_string();

    // 1. SUM(...) 重写为数字
    while let Some(caps) = sum_regex().captures(&text) {
        let span = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        let args = caps[1].to_string();
        let total = sum_arguments(workbook, sheet, &args, visited);
        text.replace_range(span, &format_number(total));
    }

    // 2. 裸引用替换；依赖链上的循环引用向外传播
    while let Some(caps) = ref_regex().captures(&text) {
        let span = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        let token = caps[1].to_string();
        let Ok((r, c)) = a1_to_rc(&token) else {
            return CellValue::Text(EVAL_ERROR.to_string());
        };
        let value = evaluate_cell(workbook, sheet, r, c, visited);
        if matches!(&value, CellValue::Text(t) if t == REF_ERROR) {
            return value;
        }
        text.replace_range(span, &format_number(value.coerce_number()));
    }

    // 3. 纯数字算术
    match expr::eval_expr(&text) {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(EVAL_ERROR.to_string()),
    }
}

/// SUM 参数求和：非数字与循环引用一律按 0 计
fn sum_arguments(workbook: &Workbook, sheet: &str, args: &str, visited: &mut Visited) -> f64 {
    let mut total = 0.0;
    for arg in args.split(',') {
        let arg = arg.trim();
        if arg.is_empty() {
            continue;
        }
        if let Some(caps) = range_regex().captures(arg) {
            let (Ok((r1, c1)), Ok((r2, c2))) = (a1_to_rc(&caps[1]), a1_to_rc(&caps[2])) else {
                continue;
            };
            for r in r1.min(r2)..=r1.max(r2) {
                for c in c1.min(c2)..=c1.max(c2) {
                    total += sum_term(workbook, sheet, r, c, visited);
                }
            }
        } else if let Ok((r, c)) = a1_to_rc(arg) {
            total += sum_term(workbook, sheet, r, c, visited);
        } else {
            // 数字字面量（剥掉千分位逗号后解析）
            total += arg.replace(',', "").parse::<f64>().unwrap_or(0.0);
        }
    }
    total
}

fn sum_term(
    workbook: &Workbook,
    sheet: &str,
    row: usize,
    col: usize,
    visited: &mut Visited,
) -> f64 {
    match evaluate_cell(workbook, sheet, row, col, visited) {
        CellValue::Text(t) if t == REF_ERROR || t == EVAL_ERROR => 0.0,
        value => value.coerce_number(),
    }
}

fn format_number(n: f64) -> String {
    // f64 Display：整数无小数点，负数带前导 '-'（解析器按一元负号接收）
    format!("{}", n)
}
