//! Spreadsheet input (first column of the first sheet) and xlsx output.

use crate::error::{Error, Result};
use crate::models::{ExtractionRecord, ExtractionResult};
use crate::utils::rfc3339;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};

pub const COLUMNS: [&str; 17] = [
    "post id",
    "post title",
    "post URL",
    "post author",
    "post score",
    "post created time",
    "comment id",
    "comment parent id",
    "comment author",
    "comment body",
    "comment score",
    "comment depth",
    "comment created time",
    "post deleted",
    "comment deleted",
    "subreddit",
    "post comment count",
];

pub const FAILURE_COLUMNS: [&str; 4] = ["input row", "URL", "error kind", "message"];

pub const RECORDS_SHEET: &str = "records";
pub const FAILURES_SHEET: &str = "failures";

/// Excel refuses longer cell strings.
const MAX_CELL_CHARS: usize = 32_767;

fn cell_text(c: &Data) -> String {
    match c {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// First-column cells and the 1-based sheet row the first of them sits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputCells {
    pub first_row: usize,
    pub cells: Vec<String>,
}

impl From<Vec<String>> for InputCells {
    fn from(cells: Vec<String>) -> Self {
        Self { first_row: 1, cells }
    }
}

/// Read the first column of the first worksheet, stopping at the first fully empty row.
///
/// Blank rows above the used area are skipped, but row numbers stay those of the sheet.
/// Cells are trimmed; header detection is up to the caller.
pub fn read_urls(path: &Path) -> Result<InputCells> {
    if !path.exists() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }
    let format_err = |message: String| Error::InputFormat {
        path: path.to_path_buf(),
        message,
    };

    let mut wb = open_workbook_auto(path).map_err(|e| format_err(e.to_string()))?;
    let range = wb
        .worksheet_range_at(0)
        .ok_or_else(|| format_err("workbook has no worksheets".into()))?
        .map_err(|e| format_err(e.to_string()))?;

    // the range is the used area; if it starts right of column A, column A is empty
    let first_col_present = range.start().map_or(true, |(_, col)| col == 0);
    let first_row = range.start().map_or(1, |(row, _)| row as usize + 1);

    let mut res = vec![];
    for row in range.rows() {
        let vals: Vec<String> = row.iter().map(cell_text).collect();
        if vals.iter().all(|v| v.is_empty()) {
            break;
        }
        let url = if first_col_present {
            vals.first().cloned().unwrap_or_default()
        } else {
            String::new()
        };
        res.push(url);
    }
    tracing::info!(path = %path.display(), first_row, rows = res.len(), "read input");
    Ok(InputCells {
        first_row,
        cells: res,
    })
}

fn clip(s: &str) -> &str {
    match s.char_indices().nth(MAX_CELL_CHARS) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Output workbook location, validated up front.
#[derive(Debug, Clone)]
pub struct SheetWriter {
    path: PathBuf,
}

impl SheetWriter {
    /// Fails with `OutputPath` when the parent directory is missing; never creates directories.
    pub fn create(path: &Path) -> Result<Self> {
        let parent_ok = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.is_dir(),
            _ => true,
        };
        if !parent_ok || path.is_dir() {
            return Err(Error::OutputPath(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Write every record in the given order, plus a failures sheet, in one save.
    /// `results` pairs each outcome with its 1-based input row.
    pub fn write(&self, results: &[(usize, ExtractionResult)]) -> Result<usize> {
        // the directory may have vanished while fetching
        SheetWriter::create(&self.path)?;
        let rows = self.build_and_save(results).map_err(|e| Error::OutputWrite {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        tracing::info!(path = %self.path.display(), rows, "wrote output");
        Ok(rows)
    }

    fn build_and_save(&self, results: &[(usize, ExtractionResult)]) -> std::result::Result<usize, XlsxError> {
        let mut records = Worksheet::new();
        records.set_name(RECORDS_SHEET)?;
        for (col, name) in COLUMNS.iter().enumerate() {
            records.write_string(0, col as u16, *name)?;
        }
        let mut row = 1u32;
        for (_, result) in results {
            for rec in result.records() {
                write_record(&mut records, row, rec)?;
                row += 1;
            }
        }

        let mut failures = Worksheet::new();
        failures.set_name(FAILURES_SHEET)?;
        for (col, name) in FAILURE_COLUMNS.iter().enumerate() {
            failures.write_string(0, col as u16, *name)?;
        }
        let mut frow = 1u32;
        for (input_row, result) in results {
            let (kind, message) = match result {
                ExtractionResult::Complete { .. } => continue,
                ExtractionResult::Partial { error, .. } => {
                    (crate::error::ErrorKind::PartialResult, error.to_string())
                }
                ExtractionResult::Failed { error, .. } => (error.kind(), error.to_string()),
            };
            failures.write_number(frow, 0, *input_row as f64)?;
            failures.write_string(frow, 1, clip(result.raw().trim()))?;
            failures.write_string(frow, 2, kind.to_string())?;
            failures.write_string(frow, 3, clip(&message))?;
            frow += 1;
        }

        // fixed creation date keeps repeated runs byte-identical
        let props = DocProperties::new().set_creation_datetime(&ExcelDateTime::from_ymd(2000, 1, 1)?);
        let mut wb = Workbook::new();
        wb.set_properties(&props);
        wb.push_worksheet(records);
        wb.push_worksheet(failures);
        wb.save(&self.path)?;
        Ok((row - 1) as usize)
    }
}

fn write_opt_str(ws: &mut Worksheet, row: u32, col: u16, v: Option<&str>) -> std::result::Result<(), XlsxError> {
    if let Some(s) = v {
        ws.write_string(row, col, clip(s))?;
    }
    Ok(())
}

fn write_opt_num(ws: &mut Worksheet, row: u32, col: u16, v: Option<i64>) -> std::result::Result<(), XlsxError> {
    if let Some(n) = v {
        ws.write_number(row, col, n as f64)?;
    }
    Ok(())
}

fn write_record(ws: &mut Worksheet, row: u32, rec: &ExtractionRecord) -> std::result::Result<(), XlsxError> {
    ws.write_string(row, 0, &rec.post_id)?;
    ws.write_string(row, 1, clip(&rec.post_title))?;
    ws.write_string(row, 2, &rec.post_url)?;
    write_opt_str(ws, row, 3, rec.post_author.as_deref())?;
    write_opt_num(ws, row, 4, rec.post_score)?;
    let created = rfc3339(rec.post_created_utc);
    if !created.is_empty() {
        ws.write_string(row, 5, &created)?;
    }
    if let Some(c) = &rec.comment {
        ws.write_string(row, 6, &c.id)?;
        ws.write_string(row, 7, &c.parent_id)?;
        write_opt_str(ws, row, 8, c.author.as_deref())?;
        ws.write_string(row, 9, clip(&c.body))?;
        write_opt_num(ws, row, 10, c.score)?;
        ws.write_number(row, 11, c.depth as f64)?;
        let created = rfc3339(c.created_utc);
        if !created.is_empty() {
            ws.write_string(row, 12, &created)?;
        }
        ws.write_boolean(row, 14, c.deleted)?;
    }
    ws.write_boolean(row, 13, rec.post_deleted)?;
    write_opt_str(ws, row, 15, rec.subreddit.as_deref())?;
    write_opt_num(ws, row, 16, rec.post_comment_count)?;
    Ok(())
}
