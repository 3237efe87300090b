//! Excel生成（CLI版）
//!
//! 共通ライブラリのバッファ生成を呼んでファイルに書き出す

use crate::error::{BoqMatchError, Result};
use boq_matcher_common::export::excel_core::generate_priced_boq_buffer;
use boq_matcher_common::PricedLine;
use std::path::Path;

pub fn generate_excel(lines: &[PricedLine], output_path: &Path, title: &str) -> Result<()> {
    let buffer = generate_priced_boq_buffer(lines, title).map_err(BoqMatchError::ExcelGeneration)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output_path, buffer)?;
    Ok(())
}
