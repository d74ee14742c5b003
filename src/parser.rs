use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::lookup::LookupTables;
use crate::models::{EmployeeRecord, ParsedBatch, RowError, MONTHS};

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// A raw spreadsheet cell, independent of the file format it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Spreadsheet date serial (days since the workbook's epoch).
    DateSerial(f64),
}

impl CellValue {
    pub fn text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(raw.to_string())
        }
    }

    /// Cell rendered as trimmed text; `None` when blank.
    pub fn as_trimmed(&self) -> Option<String> {
        let s = match self {
            Self::Empty => return None,
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) | Self::DateSerial(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Self::Bool(b) => b.to_string(),
        };
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }

    fn is_blank(&self) -> bool {
        self.as_trimmed().is_none()
    }
}

#[cfg(feature = "xlsx")]
impl From<&calamine::Data> for CellValue {
    fn from(cell: &calamine::Data) -> Self {
        use calamine::Data;
        match cell {
            Data::Empty | Data::Error(_) => Self::Empty,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Self::text(s),
            Data::Float(f) => Self::Number(*f),
            Data::Int(i) => Self::Number(*i as f64),
            Data::Bool(b) => Self::Bool(*b),
            Data::DateTime(dt) => Self::DateSerial(dt.as_f64()),
        }
    }
}

// ---------------------------------------------------------------------------
// Layout and date handling
// ---------------------------------------------------------------------------

/// Epoch used to interpret spreadsheet date serials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateSystem {
    #[default]
    #[serde(rename = "1900")]
    Excel1900,
    #[serde(rename = "1904")]
    Excel1904,
}

/// Zero-based column positions of each field in a data row.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub branch: usize,
    pub status: usize,
    pub name: usize,
    pub date_of_birth: usize,
    pub email: usize,
    pub position: usize,
    pub manager: usize,
    pub margins: usize,
    pub new_accounts: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            branch: 0,
            status: 1,
            name: 2,
            date_of_birth: 4,
            email: 5,
            position: 6,
            manager: 7,
            margins: 8,
            new_accounts: 8 + MONTHS,
        }
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

const DEFAULT_POSITION: &str = "Marketing";
const DEFAULT_STATUS: &str = "Aktif";
const HIERARCHY_SEPARATORS: &[&str] = &["→", "->", ">"];
// Largest serial a spreadsheet can represent (9999-12-31).
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

fn bracket_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([A-Za-z0-9]+)\]").expect("static regex"))
}

fn iso_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex"))
}

pub fn extract_bracket_code(text: &str) -> Option<String> {
    bracket_token()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn serial_to_date(serial: f64, system: DateSystem) -> Option<String> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_DATE_SERIAL {
        return None;
    }
    // 1900 system: epoch 1899-12-30 absorbs the phantom 1900-02-29.
    let base = match system {
        DateSystem::Excel1900 => NaiveDate::from_ymd_opt(1899, 12, 30)?,
        DateSystem::Excel1904 => NaiveDate::from_ymd_opt(1904, 1, 1)?,
    };
    base.checked_add_signed(chrono::Duration::days(serial.floor() as i64))
        .map(|d| d.format("%Y-%m-%d").to_string())
}

const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

fn parse_date_text(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if iso_date().is_match(raw) {
        return Some(raw.to_string());
    }
    // ISO timestamps such as 1990-01-15T00:00:00
    if let Some(prefix) = raw.get(..10) {
        if iso_date().is_match(prefix) && raw[10..].starts_with(['T', ' ']) {
            return Some(prefix.to_string());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Date of birth as `YYYY-MM-DD`, or `None` if the cell is unreadable.
pub fn parse_birth_date(cell: &CellValue, system: DateSystem) -> Option<String> {
    match cell {
        CellValue::Number(n) | CellValue::DateSerial(n) => serial_to_date(*n, system),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<f64>() {
                Ok(serial) => serial_to_date(serial, system),
                Err(_) => parse_date_text(trimmed),
            }
        }
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

/// Lenient numeric coercion for the monthly columns; anything unreadable is 0.
pub fn parse_number(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Number(n) | CellValue::DateSerial(n) => {
            if n.is_finite() {
                *n
            } else {
                0.0
            }
        }
        CellValue::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            match cleaned.parse::<f64>() {
                Ok(n) if n.is_finite() => n,
                _ => {
                    if !cleaned.is_empty() {
                        tracing::debug!(raw = %s, "unreadable number stored as 0");
                    }
                    0.0
                }
            }
        }
        CellValue::Empty | CellValue::Bool(_) => 0.0,
    }
}

pub fn position_from_text(raw: &str) -> String {
    if let Some(code) = extract_bracket_code(raw) {
        return code;
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() || HIERARCHY_SEPARATORS.iter().any(|sep| trimmed.contains(sep)) {
        return DEFAULT_POSITION.to_string();
    }
    trimmed.to_string()
}

pub fn synthesized_code(row: usize) -> String {
    format!("EMP{row:05}")
}

// ---------------------------------------------------------------------------
// Row parser
// ---------------------------------------------------------------------------

/// Turns raw rows into `EmployeeRecord`s using injected tables and layout.
pub struct RowParser<'a> {
    tables: &'a LookupTables,
    layout: ColumnLayout,
    date_system: DateSystem,
}

impl<'a> RowParser<'a> {
    pub fn new(tables: &'a LookupTables) -> Self {
        Self {
            tables,
            layout: ColumnLayout::default(),
            date_system: DateSystem::default(),
        }
    }

    pub fn with_layout(mut self, layout: ColumnLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_date_system(mut self, date_system: DateSystem) -> Self {
        self.date_system = date_system;
        self
    }

    /// Parse one data row. `row` is the 1-based spreadsheet row number.
    pub fn parse_row(&self, cells: &[CellValue], row: usize) -> std::result::Result<EmployeeRecord, RowError> {
        let cell = |idx: usize| cells.get(idx).unwrap_or(&EMPTY_CELL);
        let text = |idx: usize| cell(idx).as_trimmed();
        let fail = |message: String| RowError { row, message };

        let branch_code = text(self.layout.branch).unwrap_or_default().to_uppercase();
        if branch_code.chars().count() != 2 {
            return Err(fail(format!("Kode cabang tidak valid: {branch_code}")));
        }
        let pt = self.tables.holding_company_for(&branch_code).ok_or_else(|| {
            fail(format!("PT tidak ditemukan untuk kode cabang: {branch_code}"))
        })?;

        let full_name = text(self.layout.name)
            .ok_or_else(|| fail("Nama karyawan kosong".to_string()))?;

        let employee_code =
            extract_bracket_code(&full_name).unwrap_or_else(|| synthesized_code(row));

        let position = position_from_text(&text(self.layout.position).unwrap_or_default());

        let mut margins = [0.0; MONTHS];
        let mut new_accounts = [0.0; MONTHS];
        for month in 0..MONTHS {
            margins[month] = parse_number(cell(self.layout.margins + month));
            new_accounts[month] = parse_number(cell(self.layout.new_accounts + month));
        }

        Ok(EmployeeRecord {
            row,
            branch_code,
            pt_code: pt.code.clone(),
            pt_name: pt.name.clone(),
            ceo_unit: pt.ceo_unit.clone(),
            work_status: text(self.layout.status).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            full_name,
            employee_code,
            date_of_birth: parse_birth_date(cell(self.layout.date_of_birth), self.date_system),
            email: text(self.layout.email),
            position,
            manager_name: text(self.layout.manager),
            margins,
            new_accounts,
        })
    }

    /// Parse a whole sheet. Bad rows land in `errors`; the batch keeps going.
    pub fn parse_rows(&self, rows: &[(usize, Vec<CellValue>)]) -> ParsedBatch {
        let mut batch = ParsedBatch::default();
        let mut seen_codes: HashSet<String> = HashSet::new();

        for (row, cells) in rows {
            match self.parse_row(cells, *row) {
                Ok(record) => {
                    if !seen_codes.insert(record.employee_code.clone()) {
                        batch.errors.push(RowError {
                            row: *row,
                            message: format!("Kode karyawan duplikat: {}", record.employee_code),
                        });
                        continue;
                    }
                    batch.org.observe(&record);
                    batch.records.push(record);
                }
                Err(err) => {
                    tracing::debug!(row = err.row, reason = %err.message, "row rejected");
                    batch.errors.push(err);
                }
            }
        }
        batch
    }
}

// ---------------------------------------------------------------------------
// File readers
// ---------------------------------------------------------------------------

/// Read data rows (header skipped, blank rows dropped) with their
/// 1-based spreadsheet row numbers.
pub fn read_rows(file_path: &Path) -> Result<Vec<(usize, Vec<CellValue>)>> {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let rows = match ext.as_str() {
        "csv" => read_csv(file_path)?,
        #[cfg(feature = "xlsx")]
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(file_path)?,
        _ => return Err(AuditError::UnsupportedFile(file_path.display().to_string())),
    };
    Ok(rows
        .into_iter()
        .skip(1)
        .filter(|(_, cells)| !cells.iter().all(CellValue::is_blank))
        .collect())
}

fn read_csv(file_path: &Path) -> Result<Vec<(usize, Vec<CellValue>)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(file_path)?;
    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        // Empty lines never become records, so the index alone drifts.
        let row = record.position().map_or(i + 1, |p| p.line() as usize);
        rows.push((row, record.iter().map(CellValue::text).collect()));
    }
    Ok(rows)
}

#[cfg(feature = "xlsx")]
fn read_workbook(file_path: &Path) -> Result<Vec<(usize, Vec<CellValue>)>> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| AuditError::Workbook(format!("Failed to open {}: {e}", file_path.display())))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AuditError::Workbook("Workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| AuditError::Workbook(format!("Failed to read sheet {sheet}: {e}")))?;

    // The used range may not start at A1; pad so column indices stay absolute.
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let rows = range
        .rows()
        .enumerate()
        .map(|(i, cells)| {
            let mut row: Vec<CellValue> = vec![CellValue::Empty; first_col as usize];
            row.extend(cells.iter().map(CellValue::from));
            (first_row as usize + i + 1, row)
        })
        .collect();
    Ok(rows)
}
