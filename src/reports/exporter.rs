//! Spreadsheet rendering of report rows.
//!
//! Layout: row 1 holds the title merged across every emitted column, row 2 is
//! blank, row 3 holds the column headers and data starts at row 4.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use rust_xlsxwriter::{Color, ColNum, Format, FormatAlign, FormatBorder, RowNum, Workbook, XlsxError};

use super::labels::Labels;
use crate::models::report::ReportRow;

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const SHEET_NAME: &str = "Sheet1";

/// Longest title fragment kept in a generated file name, in characters.
const MAX_TITLE_FRAGMENT: usize = 30;

const TITLE_ROW: RowNum = 0;
const HEADER_ROW: RowNum = 2;
/// Zero-based row where data begins.
pub const DATA_START_ROW: RowNum = 3;

const COLUMN_WIDTH: f64 = 15.0;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("report has no columns to render")]
    NoColumns,
    #[error("report has too many columns or rows for one sheet")]
    OutOfRange,
    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] XlsxError),
}

/// A rendered report, fully in memory.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub title: String,
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TabularExporter {
    labels: Arc<Labels>,
}

impl TabularExporter {
    pub fn new(labels: Arc<Labels>) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn render(&self, rows: &[ReportRow], fields: &[&str], title: &str) -> Result<Artifact, RenderError> {
        self.render_at(rows, fields, title, Local::now().naive_local())
    }

    /// Emits exactly `fields`, in order. Extra row fields are ignored, missing
    /// ones render empty.
    pub fn render_at(
        &self,
        rows: &[ReportRow],
        fields: &[&str],
        title: &str,
        timestamp: NaiveDateTime,
    ) -> Result<Artifact, RenderError> {
        if fields.is_empty() {
            return Err(RenderError::NoColumns);
        }
        let last_col = ColNum::try_from(fields.len() - 1).map_err(|_| RenderError::OutOfRange)?;

        let title_format = Format::new()
            .set_bold()
            .set_font_size(16)
            .set_font_color(Color::RGB(0x1F497D))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        let header_format = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(0x4472C4))
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        let data_format = Format::new()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::VerticalCenter);

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        // a one-cell range cannot be merged
        if last_col == 0 {
            sheet.write_string_with_format(TITLE_ROW, 0, title, &title_format)?;
        } else {
            sheet.merge_range(TITLE_ROW, 0, TITLE_ROW, last_col, title, &title_format)?;
        }
        sheet.set_row_height(TITLE_ROW, 30)?;

        for (col, field) in (0..=last_col).zip(fields) {
            sheet.write_string_with_format(HEADER_ROW, col, self.labels.header(field), &header_format)?;
            sheet.set_column_width(col, COLUMN_WIDTH)?;
        }
        sheet.set_row_height(HEADER_ROW, 25)?;

        for (offset, row) in rows.iter().enumerate() {
            let row_num = RowNum::try_from(offset)
                .ok()
                .and_then(|offset| offset.checked_add(DATA_START_ROW))
                .ok_or(RenderError::OutOfRange)?;
            for (col, field) in (0..=last_col).zip(fields) {
                sheet.write_string_with_format(row_num, col, row.get(field).unwrap_or(""), &data_format)?;
            }
        }

        let bytes = workbook.save_to_buffer()?;

        Ok(Artifact {
            title: title.to_string(),
            file_name: format!("{}_{}.xlsx", sanitize_filename(title), timestamp.format("%Y%m%d_%H%M%S")),
            content_type: XLSX_CONTENT_TYPE,
            bytes,
        })
    }
}

/// Replaces characters hostile to paths and file systems with `_` and keeps
/// at most the first 30 characters.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_TITLE_FRAGMENT)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
    use chrono::NaiveDate;

    use super::*;

    fn exporter() -> TabularExporter {
        TabularExporter::new(Arc::new(Labels::vietnamese()))
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap()
    }

    fn open(bytes: &[u8]) -> Xlsx<Cursor<Vec<u8>>> {
        open_workbook_from_rs(Cursor::new(bytes.to_vec())).unwrap()
    }

    fn cell(range: &Range<Data>, row: u32, col: u32) -> String {
        match range.get_value((row, col)) {
            Some(Data::String(s)) => s.clone(),
            Some(Data::Empty) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    fn line(range: &Range<Data>, row: u32, width: u32) -> Vec<String> {
        (0..width).map(|col| cell(range, row, col)).collect()
    }

    #[test]
    fn data_region_round_trips_in_column_order() {
        let rows = vec![
            ReportRow::new()
                .with("notes", "rush, handle with care")
                .with("customer_name", "Công ty An Phát")
                .with("unused", "ignored"),
            ReportRow::new().with("customer_name", "Minh Long"),
        ];
        let fields = ["customer_name", "warehouse_code", "notes"];

        let artifact = exporter()
            .render_at(&rows, &fields, "Export Sales 230: Tháng hiện tại", stamp())
            .unwrap();
        let mut workbook = open(&artifact.bytes);
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();

        assert_eq!(cell(&range, 0, 0), "Export Sales 230: Tháng hiện tại");
        assert!(line(&range, 1, 3).iter().all(String::is_empty));
        assert_eq!(line(&range, HEADER_ROW, 3), vec!["Tên khách hàng", "warehouse_code", "Ghi chú"]);
        assert_eq!(line(&range, DATA_START_ROW, 3), vec!["Công ty An Phát", "", "rush, handle with care"]);
        assert_eq!(line(&range, DATA_START_ROW + 1, 3), vec!["Minh Long", "", ""]);
        assert!(line(&range, DATA_START_ROW + 2, 3).iter().all(String::is_empty));
    }

    #[test]
    fn title_spans_every_column() {
        let artifact = exporter()
            .render_at(&[], &["doc_date", "ar_type", "notes"], "Export Sales 610", stamp())
            .unwrap();
        let mut workbook = open(&artifact.bytes);
        workbook.load_merged_regions().unwrap();

        let merged = workbook.merged_regions_by_sheet(SHEET_NAME);
        assert_eq!(merged.len(), 1);
        let (_, _, dims) = merged[0];
        assert_eq!(dims.start, (0, 0));
        assert_eq!(dims.end, (0, 2));
    }

    #[test]
    fn single_column_title_is_written_unmerged() {
        let artifact = exporter().render_at(&[], &["notes"], "Only notes", stamp()).unwrap();
        let mut workbook = open(&artifact.bytes);
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        assert_eq!(cell(&range, 0, 0), "Only notes");
        assert_eq!(cell(&range, HEADER_ROW, 0), "Ghi chú");
    }

    #[test]
    fn file_name_is_sanitized_and_stamped() {
        let artifact = exporter()
            .render_at(
                &[],
                &["notes"],
                "Export Sales 230 from 01/03/2024 to 15/03/2024",
                stamp(),
            )
            .unwrap();
        assert_eq!(artifact.file_name, "Export Sales 230 from 01_03_20_20240315_090507.xlsx");
        assert_eq!(artifact.content_type, XLSX_CONTENT_TYPE);
    }

    #[test]
    fn sanitize_counts_characters_not_bytes() {
        let name = sanitize_filename("Báo cáo: Tháng hiện tại / ước tính quý*");
        assert_eq!(name.chars().count(), 30);
        assert!(!name.contains(':') && !name.contains('/'));
    }

    #[test]
    fn no_columns_is_a_render_error() {
        let err = exporter().render_at(&[], &[], "empty", stamp()).unwrap_err();
        assert!(matches!(err, RenderError::NoColumns));
    }
}
