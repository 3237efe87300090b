//! Excel生成（共通ライブラリ）
//!
//! 価格付けしたBOQ明細を1シートの表にまとめる

use crate::types::PricedLine;
use rust_xlsxwriter::*;

/// (見出し, 列幅)
const COLUMNS: &[(&str, f64)] = &[
    ("Row", 6.0),
    ("Description", 48.0),
    ("Qty", 10.0),
    ("Unit", 8.0),
    ("Matched Item", 40.0),
    ("Code", 14.0),
    ("Rate", 12.0),
    ("Total", 14.0),
    ("Confidence", 11.0),
    ("Method", 8.0),
];

/// Excelをバッファに生成
///
/// 閾値未満で採用されなかった明細は照合欄を空欄にし、信頼度だけ残す。
pub fn generate_priced_boq_buffer(lines: &[PricedLine], title: &str) -> Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();

    let title_format = Format::new().set_bold().set_font_size(14.0);

    let header_format = Format::new()
        .set_bold()
        .set_font_size(10.0)
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0xAAAAAA));

    let text_format = Format::new()
        .set_text_wrap()
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let money_format = Format::new()
        .set_num_format("#,##0.00")
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let percent_format = Format::new()
        .set_num_format("0%")
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let unmatched_format = text_format.clone().set_font_color(Color::RGB(0xC00000));

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("BOQ")
        .map_err(|e| format!("シート名設定エラー: {}", e))?;

    worksheet
        .write_string_with_format(0, 0, title, &title_format)
        .map_err(|e| format!("タイトル書き込みエラー: {}", e))?;

    for (col, (label, width)) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet
            .set_column_width(col, *width)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;
        worksheet
            .write_string_with_format(2, col, *label, &header_format)
            .map_err(|e| format!("見出し書き込みエラー: {}", e))?;
    }
    worksheet
        .set_freeze_panes(3, 0)
        .map_err(|e| format!("ウィンドウ枠固定エラー: {}", e))?;

    let mut row: u32 = 3;
    for line in lines {
        write_line(
            worksheet,
            row,
            line,
            &text_format,
            &money_format,
            &percent_format,
            &unmatched_format,
        )
        .map_err(|e| format!("明細書き込みエラー (行 {}): {}", line.row_number, e))?;
        row += 1;
    }

    // 合計行
    let grand_total: f64 = lines.iter().map(|l| l.total_price).sum();
    worksheet
        .write_string_with_format(row + 1, 6, "Total", &header_format)
        .map_err(|e| format!("合計書き込みエラー: {}", e))?;
    worksheet
        .write_number_with_format(row + 1, 7, grand_total, &money_format)
        .map_err(|e| format!("合計書き込みエラー: {}", e))?;

    // バッファに書き出し
    workbook
        .save_to_buffer()
        .map_err(|e| format!("Excel保存エラー: {}", e))
}

fn write_line(
    worksheet: &mut Worksheet,
    row: u32,
    line: &PricedLine,
    text_format: &Format,
    money_format: &Format,
    percent_format: &Format,
    unmatched_format: &Format,
) -> Result<(), XlsxError> {
    worksheet.write_number_with_format(row, 0, line.row_number as f64, text_format)?;
    worksheet.write_string_with_format(row, 1, &line.description, text_format)?;
    match line.quantity {
        Some(qty) => worksheet.write_number_with_format(row, 2, qty, text_format)?,
        None => worksheet.write_blank(row, 2, text_format)?,
    };
    worksheet.write_string_with_format(row, 3, line.unit.as_deref().unwrap_or(""), text_format)?;

    match &line.matched {
        Some(m) => {
            worksheet.write_string_with_format(row, 4, &m.matched_description, text_format)?;
            worksheet.write_string_with_format(row, 5, &m.matched_code, text_format)?;
            worksheet.write_number_with_format(row, 6, m.matched_rate, money_format)?;
            worksheet.write_number_with_format(row, 7, line.total_price, money_format)?;
            worksheet.write_string_with_format(row, 9, m.method.to_string(), text_format)?;
        }
        None => {
            worksheet.write_string_with_format(row, 4, "(no match)", unmatched_format)?;
            for col in [5u16, 6, 7, 9] {
                worksheet.write_blank(row, col, text_format)?;
            }
        }
    }
    worksheet.write_number_with_format(row, 8, line.confidence, percent_format)?;

    Ok(())
}
