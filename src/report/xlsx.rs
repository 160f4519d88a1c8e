use std::path::Path;

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, FormatUnderline, Url, Workbook, Worksheet};
use tracing::{debug, instrument};

use super::types::ProcessedRecord;
use super::{rows, ReportError, ReportRenderer, COLUMNS};

const SHEET_NAME: &str = "Release Components";
const WIDTHS: [f64; 6] = [10.0, 100.0, 20.0, 30.0, 15.0, 20.0];

const SPRINT_COL: u16 = 0;
const PATH_COL: u16 = 1;
const TASK_COL: u16 = 2;
const COMPONENT_COL: u16 = 3;
const KIND_COL: u16 = 4;
const OWNER_COL: u16 = 5;
const LAST_COL: u16 = OWNER_COL;

/// Spreadsheet renderer. Rows of one record are framed together and the
/// sprint, task and owner cells are merged across them.
#[derive(Debug, Clone, Default)]
pub struct XlsxRenderer {
    /// Work item URL prefix; the task number is appended to it.
    work_item_url: Option<String>,
}

impl XlsxRenderer {
    pub fn new(work_item_url: Option<String>) -> Self {
        Self { work_item_url }
    }

    fn write_header(&self, sheet: &mut Worksheet) -> Result<(), ReportError> {
        let header = Format::new()
            .set_bold()
            .set_border(FormatBorder::Thick)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);

        for (col, (title, width)) in COLUMNS.iter().zip(WIDTHS).enumerate() {
            let col = col as u16;
            sheet.set_column_width(col, width)?;
            sheet.write_string_with_format(0, col, *title, &header)?;
        }
        Ok(())
    }

    /// Write the rows of one record starting at `first_row`; returns the
    /// number of rows written.
    fn write_record(
        &self,
        sheet: &mut Worksheet,
        record: &ProcessedRecord,
        first_row: u32,
    ) -> Result<u32, ReportError> {
        let count = record.changes.len() as u32;
        if count == 0 {
            return Ok(0);
        }
        let last_row = first_row + count - 1;
        let task = record.task_label();

        for (offset, line) in rows(std::slice::from_ref(record)).iter().enumerate() {
            let row = first_row + offset as u32;
            let (first, last) = (row == first_row, row == last_row);

            sheet.write_string_with_format(row, PATH_COL, &line.path, &cell_format(PATH_COL, first, last))?;
            sheet.write_string_with_format(
                row,
                COMPONENT_COL,
                line.component_type,
                &cell_format(COMPONENT_COL, first, last),
            )?;
            sheet.write_string_with_format(
                row,
                KIND_COL,
                line.change_kind,
                &cell_format(KIND_COL, first, last),
            )?;
        }

        // Shared columns span the whole record.
        let sprint = record.sprint.to_string();
        let sprint_format = cell_format(SPRINT_COL, true, true);
        self.write_shared(sheet, first_row, last_row, SPRINT_COL, &sprint, &sprint_format)?;
        sheet.write_number_with_format(first_row, SPRINT_COL, record.sprint, &sprint_format)?;

        let task_format = cell_format(TASK_COL, true, true);
        self.write_shared(sheet, first_row, last_row, TASK_COL, &task, &task_format)?;
        if let Some(base) = &self.work_item_url {
            let link = Url::new(format!("{}/{}", base.trim_end_matches('/'), record.task_number))
                .set_text(&task);
            let link_format = task_format
                .clone()
                .set_font_color(rust_xlsxwriter::Color::Blue)
                .set_underline(FormatUnderline::Single);
            sheet.write_url_with_format(first_row, TASK_COL, link, &link_format)?;
        }

        let owner_format = cell_format(OWNER_COL, true, true);
        self.write_shared(sheet, first_row, last_row, OWNER_COL, &record.owner, &owner_format)?;

        Ok(count)
    }

    fn write_shared(
        &self,
        sheet: &mut Worksheet,
        first_row: u32,
        last_row: u32,
        col: u16,
        value: &str,
        format: &Format,
    ) -> Result<(), ReportError> {
        if last_row > first_row {
            sheet.merge_range(first_row, col, last_row, col, value, format)?;
        } else {
            sheet.write_string_with_format(first_row, col, value, format)?;
        }
        Ok(())
    }
}

impl ReportRenderer for XlsxRenderer {
    #[instrument(skip(self, records), fields(records = records.len(), output = %output.display()))]
    fn render(&self, records: &[ProcessedRecord], output: &Path) -> Result<(), ReportError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;
        self.write_header(sheet)?;

        let mut next_row = 1;
        for record in records {
            next_row += self.write_record(sheet, record, next_row)?;
        }
        debug!(rows = next_row - 1, "wrote report rows");

        workbook.save(output)?;
        Ok(())
    }
}

/// Thin inner borders, a thick frame around each record, and every column
/// except the path centered.
fn cell_format(col: u16, first_row: bool, last_row: bool) -> Format {
    let mut format = Format::new().set_border(FormatBorder::Thin);
    if first_row {
        format = format.set_border_top(FormatBorder::Thick);
    }
    if last_row {
        format = format.set_border_bottom(FormatBorder::Thick);
    }
    if col == SPRINT_COL {
        format = format.set_border_left(FormatBorder::Thick);
    }
    if col == LAST_COL {
        format = format.set_border_right(FormatBorder::Thick);
    }
    if col != PATH_COL {
        format = format
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
    }
    format
}
