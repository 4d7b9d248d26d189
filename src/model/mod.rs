//! 工作簿状态引擎：单元格 / 工作表 / 操作日志 / 撤销 / 溯源

pub mod cell;
pub mod engine;
pub mod ops;
pub mod refs;
pub mod sheet;

pub use cell::{Cell, CellFormat, CellValue, Provenance};
pub use engine::{SheetModel, Workbook, WorkbookInput, DEFAULT_SHEET};
pub use ops::{Checkpoint, Event, Op};
pub use refs::{a1_to_rc, rc_to_a1, RangeRef};
pub use sheet::Sheet;
