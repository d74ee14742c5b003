use std::collections::BTreeMap;

use serde::Serialize;

pub const MONTHS: usize = 12;

/// One spreadsheet row after parsing, before anything is persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeRecord {
    pub row: usize,
    pub branch_code: String,
    pub pt_code: String,
    pub pt_name: String,
    pub ceo_unit: String,
    pub work_status: String,
    pub full_name: String,
    pub employee_code: String,
    /// `YYYY-MM-DD`, or `None` when the cell could not be read as a date.
    pub date_of_birth: Option<String>,
    pub email: Option<String>,
    pub position: String,
    pub manager_name: Option<String>,
    pub margins: [f64; MONTHS],
    pub new_accounts: [f64; MONTHS],
}

/// A row that could not become an `EmployeeRecord`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingCompanySeed {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CeoUnitSeed {
    pub name: String,
    pub pt_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchSeed {
    pub code: String,
    pub pt_code: String,
    pub ceo_unit: String,
}

/// Distinct organizational entities observed across a batch, keyed by
/// natural key so they can be created without revisiting raw rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrgSets {
    pub holding_companies: BTreeMap<String, HoldingCompanySeed>,
    pub ceo_units: BTreeMap<String, CeoUnitSeed>,
    pub branches: BTreeMap<String, BranchSeed>,
}

impl OrgSets {
    pub fn observe(&mut self, record: &EmployeeRecord) {
        self.holding_companies
            .entry(record.pt_code.clone())
            .or_insert_with(|| HoldingCompanySeed {
                code: record.pt_code.clone(),
                name: record.pt_name.clone(),
            });
        self.ceo_units
            .entry(record.ceo_unit.clone())
            .or_insert_with(|| CeoUnitSeed {
                name: record.ceo_unit.clone(),
                pt_code: record.pt_code.clone(),
            });
        self.branches
            .entry(record.branch_code.clone())
            .or_insert_with(|| BranchSeed {
                code: record.branch_code.clone(),
                pt_code: record.pt_code.clone(),
                ceo_unit: record.ceo_unit.clone(),
            });
    }
}

/// Everything the parser produced from one spreadsheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedBatch {
    pub records: Vec<EmployeeRecord>,
    pub errors: Vec<RowError>,
    pub org: OrgSets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Freelance,
    Resigned,
}

impl EmployeeStatus {
    pub fn from_work_status(raw: &str) -> Self {
        let upper = raw.trim().to_uppercase();
        match upper.as_str() {
            "FREELANCE" | "FL" => Self::Freelance,
            "RESIGN" | "RESIGNED" | "KELUAR" | "NON AKTIF" | "NONAKTIF" => Self::Resigned,
            _ => Self::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Freelance => "freelance",
            Self::Resigned => "resigned",
        }
    }
}

/// A per-employee problem surfaced in the upload summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadIssue {
    pub employee_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub holding_companies_created: usize,
    pub ceo_units_created: usize,
    pub branches_created: usize,
    pub employees_created: usize,
    pub employees_updated: usize,
    pub employees_deleted: usize,
    pub performance_records_created: usize,
    pub hierarchy_links: usize,
    pub email_conflicts: usize,
    pub row_errors: Vec<RowError>,
    pub errors: Vec<UploadIssue>,
    pub skipped_links: Vec<UploadIssue>,
    /// Stored employees rewritten through a row-number placeholder code.
    pub warnings: Vec<UploadIssue>,
}
