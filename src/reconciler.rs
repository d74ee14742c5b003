use std::collections::{HashMap, HashSet};

use rusqlite::{Connection, OptionalExtension, ToSql};
use tracing::{debug, error, info};

use crate::error::{aborted, AuditError, Result};
use crate::lookup::LookupTables;
use crate::models::{
    BranchSeed, CeoUnitSeed, EmployeeRecord, EmployeeStatus, HoldingCompanySeed, ParsedBatch,
    UploadIssue, UploadSummary, MONTHS,
};
use crate::parser::extract_bracket_code;
use crate::settings::BatchLimits;

/// Stored when a date of birth could not be read from the sheet.
pub const DEFAULT_BIRTH_DATE: &str = "1900-01-01";
const MIN_EMAIL_LEN: usize = 5;

pub struct UploadRequest<'a> {
    /// `YYYY-MM`; its year selects which monthly rows are written.
    pub period: &'a str,
    pub overwrite_existing: bool,
    pub uploaded_by: &'a str,
    pub source_file: Option<&'a str>,
    pub checksum: Option<&'a str>,
}

/// Validate an upload period and return its year.
pub fn parse_period(period: &str) -> Result<i32> {
    let invalid = || AuditError::InvalidPeriod(period.to_string());
    let (year, month) = period.trim().split_once('-').ok_or_else(invalid)?;
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if year.len() != 4 || month.len() != 2 || !digits(year) || !digits(month) {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok(year)
}

pub fn ceo_unit_code(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(10)
        .collect::<String>()
        .to_uppercase()
}

/// A record that passed position resolution, ready to be written.
struct Staged<'r> {
    record: &'r EmployeeRecord,
    holding_company_id: i64,
    branch_id: i64,
    position_id: i64,
    status: &'static str,
    email: Option<String>,
    date_of_birth: &'r str,
}

/// Persists a parsed batch: org entities, employees, hierarchy links and
/// monthly performance, all inside one transaction.
pub struct UploadEngine<'a> {
    tables: &'a LookupTables,
    limits: BatchLimits,
}

impl<'a> UploadEngine<'a> {
    pub fn new(tables: &'a LookupTables) -> Self {
        Self {
            tables,
            limits: BatchLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = BatchLimits {
            employee_insert: limits.employee_insert.max(1),
            performance_insert: limits.performance_insert.max(1),
            performance_delete: limits.performance_delete.max(1),
        };
        self
    }

    pub fn run(
        &self,
        conn: &mut Connection,
        batch: &ParsedBatch,
        request: &UploadRequest,
    ) -> Result<UploadSummary> {
        let year = parse_period(request.period)?;
        info!(
            period = request.period,
            overwrite = request.overwrite_existing,
            records = batch.records.len(),
            row_errors = batch.errors.len(),
            "starting upload"
        );

        let tx = conn.transaction().map_err(aborted("begin transaction"))?;
        match self.apply(&tx, batch, request, year) {
            Ok(summary) => {
                tx.commit().map_err(aborted("commit"))?;
                info!(
                    created = summary.employees_created,
                    updated = summary.employees_updated,
                    performance = summary.performance_records_created,
                    links = summary.hierarchy_links,
                    email_conflicts = summary.email_conflicts,
                    "upload committed"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, "upload aborted, rolling back");
                Err(e)
            }
        }
    }

    fn apply(
        &self,
        conn: &Connection,
        batch: &ParsedBatch,
        request: &UploadRequest,
        year: i32,
    ) -> Result<UploadSummary> {
        let mut summary = UploadSummary {
            row_errors: batch.errors.clone(),
            ..UploadSummary::default()
        };

        if request.overwrite_existing {
            summary.employees_deleted = conn
                .execute("DELETE FROM employees", [])
                .map_err(aborted("clear employees"))?;
            info!(deleted = summary.employees_deleted, "overwrite: cleared employees");
        }

        let mut pt_ids: HashMap<&str, i64> = HashMap::new();
        for seed in batch.org.holding_companies.values() {
            let (id, created) =
                upsert_holding_company(conn, seed).map_err(aborted("holding companies"))?;
            summary.holding_companies_created += created as usize;
            pt_ids.insert(seed.code.as_str(), id);
        }

        let mut unit_ids: HashMap<&str, i64> = HashMap::new();
        for seed in batch.org.ceo_units.values() {
            let Some(&pt_id) = pt_ids.get(seed.pt_code.as_str()) else {
                continue;
            };
            let (id, created) = upsert_ceo_unit(conn, seed, pt_id).map_err(aborted("CEO units"))?;
            summary.ceo_units_created += created as usize;
            unit_ids.insert(seed.name.as_str(), id);
        }

        let mut branch_ids: HashMap<&str, i64> = HashMap::new();
        for seed in batch.org.branches.values() {
            let Some(&pt_id) = pt_ids.get(seed.pt_code.as_str()) else {
                continue;
            };
            let unit_id = unit_ids.get(seed.ceo_unit.as_str()).copied();
            let (id, created) =
                upsert_branch(conn, seed, pt_id, unit_id).map_err(aborted("branches"))?;
            summary.branches_created += created as usize;
            branch_ids.insert(seed.code.as_str(), id);
        }

        let position_ids = load_position_ids(conn).map_err(aborted("positions"))?;
        let mut staged: Vec<Staged> = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            let (Some(&holding_company_id), Some(&branch_id)) = (
                pt_ids.get(record.pt_code.as_str()),
                branch_ids.get(record.branch_code.as_str()),
            ) else {
                summary.errors.push(UploadIssue {
                    employee_name: record.full_name.clone(),
                    message: format!("Cabang tidak terdaftar: {}", record.branch_code),
                });
                continue;
            };
            let Some(position_id) = self.resolve_position(&record.position, &position_ids) else {
                summary.errors.push(UploadIssue {
                    employee_name: record.full_name.clone(),
                    message: format!("Jabatan tidak ditemukan: {}", record.position),
                });
                continue;
            };
            staged.push(Staged {
                record,
                holding_company_id,
                branch_id,
                position_id,
                status: EmployeeStatus::from_work_status(&record.work_status).as_str(),
                email: record.email.clone(),
                date_of_birth: record.date_of_birth.as_deref().unwrap_or(DEFAULT_BIRTH_DATE),
            });
        }

        let existing = load_employee_ids(conn).map_err(aborted("load employees"))?;
        let batch_codes: HashSet<String> = staged
            .iter()
            .map(|s| s.record.employee_code.clone())
            .collect();
        let foreign_emails =
            load_foreign_emails(conn, &batch_codes).map_err(aborted("load emails"))?;
        summary.email_conflicts = defuse_email_conflicts(&mut staged, &foreign_emails);

        let ids = self.write_employees(conn, &staged, &existing, &mut summary)?;

        link_managers(conn, &staged, &ids, &mut summary)?;

        summary.performance_records_created =
            self.write_performance(conn, &staged, &ids, year, request.overwrite_existing)?;

        conn.execute(
            "INSERT INTO uploads (filename, checksum, period, uploaded_by, overwrite, employees_created, \
             employees_updated, performance_records, error_count) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                request.source_file,
                request.checksum,
                request.period,
                request.uploaded_by,
                request.overwrite_existing,
                summary.employees_created as i64,
                summary.employees_updated as i64,
                summary.performance_records_created as i64,
                (summary.row_errors.len() + summary.errors.len()) as i64,
            ],
        )
        .map_err(aborted("record upload"))?;

        Ok(summary)
    }

    fn resolve_position(&self, label: &str, position_ids: &HashMap<String, i64>) -> Option<i64> {
        let code = self
            .tables
            .canonical_position(label)
            .map(str::to_string)
            .unwrap_or_else(|| label.trim().to_uppercase());
        position_ids.get(&code).copied()
    }

    /// Rewrite employees whose code already exists, bulk-insert the rest.
    /// Returns database ids parallel to `staged`.
    fn write_employees(
        &self,
        conn: &Connection,
        staged: &[Staged],
        existing: &HashMap<String, i64>,
        summary: &mut UploadSummary,
    ) -> Result<Vec<i64>> {
        let mut ids = vec![0i64; staged.len()];
        let mut to_update: Vec<usize> = Vec::new();
        let mut to_insert: Vec<usize> = Vec::new();
        for (i, s) in staged.iter().enumerate() {
            match existing.get(&s.record.employee_code) {
                Some(&id) => {
                    ids[i] = id;
                    to_update.push(i);
                    // A placeholder code only says which sheet row this was.
                    if extract_bracket_code(&s.record.full_name).is_none() {
                        summary.warnings.push(UploadIssue {
                            employee_name: s.record.full_name.clone(),
                            message: format!(
                                "Kode sementara {} menimpa karyawan yang sudah ada",
                                s.record.employee_code
                            ),
                        });
                    }
                }
                None => to_insert.push(i),
            }
        }

        if !to_update.is_empty() {
            // Release old emails first so swapped addresses don't trip UNIQUE.
            for chunk in to_update.chunks(self.limits.employee_insert) {
                let sql = format!(
                    "UPDATE employees SET email = NULL WHERE id IN ({})",
                    placeholders(chunk.len())
                );
                let params: Vec<&dyn ToSql> = chunk.iter().map(|&i| &ids[i] as &dyn ToSql).collect();
                conn.execute(&sql, params.as_slice())
                    .map_err(aborted("update employees"))?;
            }
            let mut stmt = conn
                .prepare_cached(
                    "UPDATE employees SET full_name = ?1, email = ?2, date_of_birth = ?3, \
                     holding_company_id = ?4, branch_id = ?5, position_id = ?6, status = ?7, \
                     manager_id = NULL, updated_at = datetime('now') WHERE id = ?8",
                )
                .map_err(aborted("update employees"))?;
            for &i in &to_update {
                let s = &staged[i];
                stmt.execute(rusqlite::params![
                    s.record.full_name,
                    s.email,
                    s.date_of_birth,
                    s.holding_company_id,
                    s.branch_id,
                    s.position_id,
                    s.status,
                    ids[i],
                ])
                .map_err(aborted("update employees"))?;
            }
            summary.employees_updated = to_update.len();
        }

        for chunk in to_insert.chunks(self.limits.employee_insert) {
            let sql = format!(
                "INSERT INTO employees (employee_code, full_name, email, date_of_birth, \
                 holding_company_id, branch_id, position_id, status) VALUES {} RETURNING id",
                row_placeholders(chunk.len(), 8)
            );
            let mut params: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() * 8);
            for &i in chunk {
                let s = &staged[i];
                params.push(&s.record.employee_code);
                params.push(&s.record.full_name);
                params.push(&s.email);
                params.push(&s.date_of_birth);
                params.push(&s.holding_company_id);
                params.push(&s.branch_id);
                params.push(&s.position_id);
                params.push(&s.status);
            }
            let mut stmt = conn.prepare(&sql).map_err(aborted("insert employees"))?;
            let mut new_ids: Vec<i64> = stmt
                .query_map(params.as_slice(), |row| row.get(0))
                .map_err(aborted("insert employees"))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(aborted("insert employees"))?;
            // Rowids of a multi-row VALUES insert ascend in VALUES order, but
            // RETURNING order is unspecified.
            new_ids.sort_unstable();
            for (&i, id) in chunk.iter().zip(new_ids) {
                ids[i] = id;
            }
            summary.employees_created += chunk.len();
        }
        debug!(
            inserted = summary.employees_created,
            updated = summary.employees_updated,
            "employees written"
        );
        Ok(ids)
    }

    fn write_performance(
        &self,
        conn: &Connection,
        staged: &[Staged],
        ids: &[i64],
        year: i32,
        overwrite: bool,
    ) -> Result<usize> {
        if overwrite {
            let year_key = year.to_string();
            for chunk in ids.chunks(self.limits.performance_delete) {
                let sql = format!(
                    "DELETE FROM monthly_performance WHERE substr(month, 1, 4) = ? AND employee_id IN ({})",
                    placeholders(chunk.len())
                );
                let mut params: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() + 1);
                params.push(&year_key);
                params.extend(chunk.iter().map(|id| id as &dyn ToSql));
                conn.execute(&sql, params.as_slice())
                    .map_err(aborted("clear performance"))?;
            }
        }

        let rows: Vec<(i64, String, f64, i64)> = staged
            .iter()
            .zip(ids)
            .flat_map(|(s, &id)| {
                (0..MONTHS).map(move |m| {
                    (
                        id,
                        format!("{year}-{:02}", m + 1),
                        s.record.margins[m],
                        s.record.new_accounts[m].round() as i64,
                    )
                })
            })
            .collect();

        for chunk in rows.chunks(self.limits.performance_insert) {
            let sql = format!(
                "INSERT INTO monthly_performance (employee_id, month, margin, new_accounts) VALUES {} \
                 ON CONFLICT(employee_id, month) DO UPDATE SET margin = excluded.margin, \
                 new_accounts = excluded.new_accounts",
                row_placeholders(chunk.len(), 4)
            );
            let mut params: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() * 4);
            for (id, month, margin, new_accounts) in chunk {
                params.push(id);
                params.push(month);
                params.push(margin);
                params.push(new_accounts);
            }
            conn.execute(&sql, params.as_slice())
                .map_err(aborted("insert performance"))?;
        }
        Ok(rows.len())
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn row_placeholders(rows: usize, columns: usize) -> String {
    let row = format!("({})", placeholders(columns));
    vec![row; rows].join(", ")
}

fn upsert_holding_company(conn: &Connection, seed: &HoldingCompanySeed) -> rusqlite::Result<(i64, bool)> {
    if let Some(id) = conn
        .query_row("SELECT id FROM holding_companies WHERE code = ?1", [&seed.code], |r| r.get(0))
        .optional()?
    {
        return Ok((id, false));
    }
    conn.execute(
        "INSERT INTO holding_companies (code, name) VALUES (?1, ?2)",
        rusqlite::params![seed.code, seed.name],
    )?;
    Ok((conn.last_insert_rowid(), true))
}

fn upsert_ceo_unit(conn: &Connection, seed: &CeoUnitSeed, pt_id: i64) -> rusqlite::Result<(i64, bool)> {
    if let Some(id) = conn
        .query_row("SELECT id FROM ceo_units WHERE name = ?1", [&seed.name], |r| r.get(0))
        .optional()?
    {
        return Ok((id, false));
    }
    conn.execute(
        "INSERT INTO ceo_units (name, code, holding_company_id) VALUES (?1, ?2, ?3)",
        rusqlite::params![seed.name, ceo_unit_code(&seed.name), pt_id],
    )?;
    Ok((conn.last_insert_rowid(), true))
}

fn upsert_branch(
    conn: &Connection,
    seed: &BranchSeed,
    pt_id: i64,
    unit_id: Option<i64>,
) -> rusqlite::Result<(i64, bool)> {
    if let Some(id) = conn
        .query_row("SELECT id FROM branches WHERE code = ?1", [&seed.code], |r| r.get(0))
        .optional()?
    {
        return Ok((id, false));
    }
    conn.execute(
        "INSERT INTO branches (code, holding_company_id, ceo_unit_id) VALUES (?1, ?2, ?3)",
        rusqlite::params![seed.code, pt_id, unit_id],
    )?;
    Ok((conn.last_insert_rowid(), true))
}

fn load_position_ids(conn: &Connection) -> rusqlite::Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT code, id FROM positions")?;
    let ids = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .map(|r| r.map(|(code, id)| (code.to_uppercase(), id)))
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
    Ok(ids)
}

fn load_employee_ids(conn: &Connection) -> rusqlite::Result<HashMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT employee_code, id FROM employees")?;
    let ids = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
    Ok(ids)
}

/// Emails held by stored employees that this batch will not rewrite.
fn load_foreign_emails(conn: &Connection, batch_codes: &HashSet<String>) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT employee_code, email FROM employees WHERE email IS NOT NULL")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut emails = HashSet::new();
    for row in rows {
        let (code, email) = row?;
        if !batch_codes.contains(code.as_str()) {
            emails.insert(email);
        }
    }
    Ok(emails)
}

/// Null out emails that are too short, repeat an earlier row's email, or
/// belong to someone outside the batch. Returns the number demoted.
fn defuse_email_conflicts(staged: &mut [Staged], foreign: &HashSet<String>) -> usize {
    let mut seen: HashSet<String> = HashSet::new();
    let mut demoted = 0;
    for s in staged.iter_mut() {
        let Some(email) = s.email.take() else {
            continue;
        };
        if email.chars().count() >= MIN_EMAIL_LEN
            && !foreign.contains(&email)
            && seen.insert(email.clone())
        {
            s.email = Some(email);
        } else {
            debug!(employee = %s.record.full_name, email = %email, "email demoted");
            demoted += 1;
        }
    }
    demoted
}

fn link_managers(
    conn: &Connection,
    staged: &[Staged],
    ids: &[i64],
    summary: &mut UploadSummary,
) -> Result<()> {
    let mut by_name: HashMap<&str, Vec<i64>> = HashMap::new();
    for (s, &id) in staged.iter().zip(ids) {
        by_name.entry(s.record.full_name.as_str()).or_default().push(id);
    }

    let mut stmt = conn
        .prepare_cached("UPDATE employees SET manager_id = ?1 WHERE id = ?2")
        .map_err(aborted("link managers"))?;
    for (s, &id) in staged.iter().zip(ids) {
        let Some(manager) = s.record.manager_name.as_deref() else {
            continue;
        };
        let skipped = match by_name.get(manager).map(Vec::as_slice) {
            None => Some(format!("Atasan tidak ditemukan: {manager}")),
            Some([manager_id]) if *manager_id == id => {
                Some(format!("Atasan menunjuk diri sendiri: {manager}"))
            }
            Some([manager_id]) => {
                stmt.execute([manager_id, &id]).map_err(aborted("link managers"))?;
                summary.hierarchy_links += 1;
                None
            }
            Some(_) => Some(format!("Nama atasan ambigu: {manager}")),
        };
        if let Some(message) = skipped {
            debug!(employee = %s.record.full_name, %message, "manager link skipped");
            summary.skipped_links.push(UploadIssue {
                employee_name: s.record.full_name.clone(),
                message,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count, test_db};
    use crate::parser::{CellValue, RowParser};

    struct Row<'a> {
        branch: &'a str,
        name: &'a str,
        email: &'a str,
        position: &'a str,
        manager: &'a str,
    }

    fn row<'a>(branch: &'a str, name: &'a str, email: &'a str, position: &'a str, manager: &'a str) -> Row<'a> {
        Row { branch, name, email, position, manager }
    }

    fn parse(rows: &[Row]) -> ParsedBatch {
        let tables = LookupTables::default();
        let raw: Vec<(usize, Vec<CellValue>)> = rows
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let mut cells = vec![
                    CellValue::text(r.branch),
                    CellValue::text("TETAP"),
                    CellValue::text(r.name),
                    CellValue::Empty,
                    CellValue::text("1990-01-15"),
                    CellValue::text(r.email),
                    CellValue::text(r.position),
                    CellValue::text(r.manager),
                ];
                for m in 0..MONTHS {
                    cells.push(CellValue::Number(100.0 * (m + 1) as f64));
                }
                for m in 0..MONTHS {
                    cells.push(CellValue::Number(m as f64));
                }
                (i + 2, cells)
            })
            .collect();
        RowParser::new(&tables).parse_rows(&raw)
    }

    fn request(overwrite: bool) -> UploadRequest<'static> {
        UploadRequest {
            period: "2025-03",
            overwrite_existing: overwrite,
            uploaded_by: "tester",
            source_file: Some("upload.xlsx"),
            checksum: None,
        }
    }

    fn run(conn: &mut Connection, batch: &ParsedBatch, overwrite: bool) -> UploadSummary {
        let tables = LookupTables::default();
        UploadEngine::new(&tables).run(conn, batch, &request(overwrite)).unwrap()
    }

    fn team() -> ParsedBatch {
        parse(&[
            row("AB", "Jane [AB000]", "jane@x.com", "BM", ""),
            row("AB", "John Doe [AB001]", "john@x.com", "EM", "Jane [AB000]"),
            row("AC", "Sari [AC001]", "sari@x.com", "KSM", "Jane [AB000]"),
            row("BA", "Budi [BA001]", "", "Marketing", "John Doe [AB001]"),
        ])
    }

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period("2025-03").unwrap(), 2025);
        assert!(parse_period("2025-13").is_err());
        assert!(parse_period("2025-3").is_err());
        assert!(parse_period("March 2025").is_err());
        assert!(parse_period("").is_err());
        assert!(parse_period("+025-03").is_err());
        assert!(parse_period("-025-03").is_err());
        assert!(parse_period("2025-+3").is_err());
    }

    #[test]
    fn test_ceo_unit_code() {
        assert_eq!(ceo_unit_code("CEO Unit SGB"), "CEOUNITSGB");
        assert_eq!(ceo_unit_code("Unit Jakarta Selatan Raya"), "UNITJAKART");
        assert_eq!(ceo_unit_code("a-b"), "AB");
    }

    #[test]
    fn test_creates_org_entities_and_employees() {
        let (_dir, mut conn) = test_db();
        let summary = run(&mut conn, &team(), false);
        assert_eq!(summary.holding_companies_created, 2);
        assert_eq!(summary.ceo_units_created, 2);
        assert_eq!(summary.branches_created, 3);
        assert_eq!(summary.employees_created, 4);
        assert_eq!(summary.employees_updated, 0);
        assert!(summary.errors.is_empty());

        let branch_unit: Option<i64> = conn
            .query_row("SELECT ceo_unit_id FROM branches WHERE code = 'AC'", [], |r| r.get(0))
            .unwrap();
        assert!(branch_unit.is_some());
        let code: String = conn
            .query_row("SELECT code FROM ceo_units WHERE name = 'CEO Unit RFB'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(code, "CEOUNITRFB");
    }

    #[test]
    fn test_org_entities_reused_across_uploads() {
        let (_dir, mut conn) = test_db();
        run(&mut conn, &team(), false);
        let second = run(&mut conn, &team(), false);
        assert_eq!(second.holding_companies_created, 0);
        assert_eq!(second.ceo_units_created, 0);
        assert_eq!(second.branches_created, 0);
        assert_eq!(count(&conn, "branches").unwrap(), 3);
    }

    #[test]
    fn test_position_aliases_resolve() {
        let (_dir, mut conn) = test_db();
        run(&mut conn, &team(), false);
        let pos: String = conn
            .query_row(
                "SELECT p.code FROM employees e JOIN positions p ON e.position_id = p.id \
                 WHERE e.employee_code = 'AC001'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(pos, "KSPV");
        let pos: String = conn
            .query_row(
                "SELECT p.code FROM employees e JOIN positions p ON e.position_id = p.id \
                 WHERE e.employee_code = 'BA001'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(pos, "MKT");
    }

    #[test]
    fn test_unknown_position_excluded_not_fatal() {
        let (_dir, mut conn) = test_db();
        let batch = parse(&[
            row("AB", "Ani [AB001]", "", "Astronaut", ""),
            row("AB", "Ben [AB002]", "", "BM", ""),
        ]);
        let summary = run(&mut conn, &batch, false);
        assert_eq!(summary.employees_created, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].employee_name, "Ani [AB001]");
        assert_eq!(summary.errors[0].message, "Jabatan tidak ditemukan: Astronaut");
    }

    #[test]
    fn test_manager_links() {
        let (_dir, mut conn) = test_db();
        let summary = run(&mut conn, &team(), false);
        assert_eq!(summary.hierarchy_links, 3);
        assert!(summary.skipped_links.is_empty());
        let manager: String = conn
            .query_row(
                "SELECT m.employee_code FROM employees e JOIN employees m ON e.manager_id = m.id \
                 WHERE e.employee_code = 'BA001'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(manager, "AB001");
    }

    #[test]
    fn test_unmatched_self_and_ambiguous_managers_are_skipped() {
        let (_dir, mut conn) = test_db();
        let batch = parse(&[
            row("AB", "Ani", "", "BM", "Nobody"),
            row("AB", "Ben [AB002]", "", "EM", "Ben [AB002]"),
            row("AB", "Twin", "", "MKT", ""),
            row("AC", "Twin", "", "MKT", ""),
            row("AC", "Cici [AC009]", "", "MKT", "Twin"),
        ]);
        let summary = run(&mut conn, &batch, false);
        assert_eq!(summary.employees_created, 5);
        assert_eq!(summary.hierarchy_links, 0);
        let messages: Vec<&str> = summary.skipped_links.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Atasan tidak ditemukan: Nobody",
                "Atasan menunjuk diri sendiri: Ben [AB002]",
                "Nama atasan ambigu: Twin",
            ]
        );
        assert!(summary.errors.is_empty());
    }

    #[test]
    fn test_duplicate_email_keeps_first() {
        let (_dir, mut conn) = test_db();
        let batch = parse(&[
            row("AB", "Ani [AB001]", "dup@x.com", "BM", ""),
            row("AB", "Ben [AB002]", "dup@x.com", "EM", ""),
        ]);
        let summary = run(&mut conn, &batch, false);
        assert_eq!(summary.email_conflicts, 1);
        assert_eq!(summary.employees_created, 2);
        let with_email: i64 = conn
            .query_row("SELECT count(*) FROM employees WHERE email = 'dup@x.com'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(with_email, 1);
        let owner: String = conn
            .query_row("SELECT employee_code FROM employees WHERE email = 'dup@x.com'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(owner, "AB001");
    }

    #[test]
    fn test_email_match_is_case_sensitive_and_short_emails_demoted() {
        let (_dir, mut conn) = test_db();
        let batch = parse(&[
            row("AB", "Ani [AB001]", "a@b", "BM", ""),
            row("AB", "Ben [AB002]", "Ben@x.com", "EM", ""),
            row("AB", "Cal [AB003]", "ben@x.com", "EM", ""),
            row("AB", "Dan [AB004]", "ben@x.com", "EM", ""),
        ]);
        let summary = run(&mut conn, &batch, false);
        assert_eq!(summary.email_conflicts, 2);
        let emails: i64 = conn
            .query_row("SELECT count(email) FROM employees", [], |r| r.get(0))
            .unwrap();
        assert_eq!(emails, 2);
    }

    #[test]
    fn test_email_owned_outside_batch_is_demoted() {
        let (_dir, mut conn) = test_db();
        run(&mut conn, &parse(&[row("AB", "Ani [AB001]", "ani@x.com", "BM", "")]), false);
        let summary = run(
            &mut conn,
            &parse(&[row("AB", "Ben [AB002]", "ani@x.com", "EM", "")]),
            false,
        );
        assert_eq!(summary.email_conflicts, 1);
        assert_eq!(summary.employees_created, 1);
    }

    #[test]
    fn test_performance_rows_for_period_year() {
        let (_dir, mut conn) = test_db();
        let summary = run(&mut conn, &team(), false);
        assert_eq!(summary.performance_records_created, 4 * MONTHS);
        assert_eq!(count(&conn, "monthly_performance").unwrap(), (4 * MONTHS) as i64);
        let (margin, accounts): (f64, i64) = conn
            .query_row(
                "SELECT mp.margin, mp.new_accounts FROM monthly_performance mp \
                 JOIN employees e ON mp.employee_id = e.id \
                 WHERE e.employee_code = 'AB001' AND mp.month = '2025-12'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(margin, 1200.0);
        assert_eq!(accounts, 11);
    }

    #[test]
    fn test_overwrite_rerun_is_idempotent() {
        let (_dir, mut conn) = test_db();
        let first = run(&mut conn, &team(), true);
        let employees = count(&conn, "employees").unwrap();
        let performance = count(&conn, "monthly_performance").unwrap();
        let second = run(&mut conn, &team(), true);
        assert_eq!(count(&conn, "employees").unwrap(), employees);
        assert_eq!(count(&conn, "monthly_performance").unwrap(), performance);
        assert_eq!(second.employees_deleted, 4);
        assert_eq!(second.employees_created, first.employees_created);
        assert_eq!(second.hierarchy_links, first.hierarchy_links);
    }

    #[test]
    fn test_overwrite_replaces_everything() {
        let (_dir, mut conn) = test_db();
        run(&mut conn, &team(), false);
        let batch = parse(&[row("DA", "Eka [DA001]", "", "BM", "")]);
        let summary = run(&mut conn, &batch, true);
        assert_eq!(summary.employees_deleted, 4);
        assert_eq!(count(&conn, "employees").unwrap(), 1);
        assert_eq!(count(&conn, "monthly_performance").unwrap(), MONTHS as i64);
        // org entities are never deleted
        assert_eq!(count(&conn, "branches").unwrap(), 4);
    }

    #[test]
    fn test_incremental_rerun_updates_in_place() {
        let (_dir, mut conn) = test_db();
        run(&mut conn, &team(), false);
        let second = run(&mut conn, &team(), false);
        assert_eq!(second.employees_created, 0);
        assert_eq!(second.employees_updated, 4);
        assert_eq!(second.email_conflicts, 0);
        assert_eq!(second.hierarchy_links, 3);
        assert_eq!(count(&conn, "employees").unwrap(), 4);
        assert_eq!(count(&conn, "monthly_performance").unwrap(), (4 * MONTHS) as i64);
    }

    #[test]
    fn test_placeholder_code_update_is_reported() {
        let (_dir, mut conn) = test_db();
        let first = run(&mut conn, &parse(&[row("AB", "Tanpa Kode", "", "BM", "")]), false);
        assert!(first.warnings.is_empty());

        let second = run(&mut conn, &parse(&[row("AB", "Orang Lain", "", "BM", "")]), false);
        assert_eq!(second.employees_updated, 1);
        assert_eq!(second.warnings.len(), 1);
        assert_eq!(second.warnings[0].employee_name, "Orang Lain");
        assert!(second.warnings[0].message.contains("EMP00002"));

        // Bracketed codes are real identities; rewriting them is not flagged.
        assert!(run(&mut conn, &team(), false).warnings.is_empty());
        assert!(run(&mut conn, &team(), false).warnings.is_empty());
    }

    #[test]
    fn test_incremental_update_can_swap_emails() {
        let (_dir, mut conn) = test_db();
        run(
            &mut conn,
            &parse(&[
                row("AB", "Ani [AB001]", "one@x.com", "BM", ""),
                row("AB", "Ben [AB002]", "two@x.com", "EM", ""),
            ]),
            false,
        );
        let summary = run(
            &mut conn,
            &parse(&[
                row("AB", "Ani [AB001]", "two@x.com", "BM", ""),
                row("AB", "Ben [AB002]", "one@x.com", "EM", ""),
            ]),
            false,
        );
        assert_eq!(summary.email_conflicts, 0);
        let email: String = conn
            .query_row("SELECT email FROM employees WHERE employee_code = 'AB001'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(email, "two@x.com");
    }

    #[test]
    fn test_small_batches_give_same_result() {
        let (_dir, mut conn) = test_db();
        let tables = LookupTables::default();
        let limits = BatchLimits {
            employee_insert: 1,
            performance_insert: 5,
            performance_delete: 2,
        };
        let engine = UploadEngine::new(&tables).with_limits(limits);
        let summary = engine.run(&mut conn, &team(), &request(true)).unwrap();
        assert_eq!(summary.employees_created, 4);
        assert_eq!(summary.hierarchy_links, 3);
        assert_eq!(summary.performance_records_created, 4 * MONTHS);
        let summary = engine.run(&mut conn, &team(), &request(true)).unwrap();
        assert_eq!(summary.employees_created, 4);
        assert_eq!(count(&conn, "monthly_performance").unwrap(), (4 * MONTHS) as i64);
    }

    #[test]
    fn test_ids_follow_input_order() {
        let (_dir, mut conn) = test_db();
        run(&mut conn, &team(), false);
        let codes: Vec<String> = conn
            .prepare("SELECT employee_code FROM employees ORDER BY id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(codes, vec!["AB000", "AB001", "AC001", "BA001"]);
    }

    #[test]
    fn test_row_errors_carried_into_summary() {
        let (_dir, mut conn) = test_db();
        let batch = parse(&[
            row("Z9", "Zed", "", "BM", ""),
            row("AB", "Ani [AB001]", "", "BM", ""),
        ]);
        let summary = run(&mut conn, &batch, false);
        assert_eq!(summary.employees_created, 1);
        assert_eq!(summary.row_errors.len(), 1);
        assert_eq!(summary.row_errors[0].message, "PT tidak ditemukan untuk kode cabang: Z9");
    }

    #[test]
    fn test_invalid_period_writes_nothing() {
        let (_dir, mut conn) = test_db();
        let tables = LookupTables::default();
        let req = UploadRequest {
            period: "2025/03",
            ..request(false)
        };
        let err = UploadEngine::new(&tables).run(&mut conn, &team(), &req).unwrap_err();
        assert!(matches!(err, AuditError::InvalidPeriod(_)));
        assert_eq!(count(&conn, "holding_companies").unwrap(), 0);
    }

    #[test]
    fn test_storage_failure_rolls_back_everything() {
        let (_dir, mut conn) = test_db();
        conn.execute_batch(
            "CREATE TRIGGER fail_perf BEFORE INSERT ON monthly_performance \
             BEGIN SELECT RAISE(ABORT, 'disk on fire'); END;",
        )
        .unwrap();
        let tables = LookupTables::default();
        let err = UploadEngine::new(&tables)
            .run(&mut conn, &team(), &request(true))
            .unwrap_err();
        assert!(err.to_string().contains("disk on fire"), "{err}");
        match err {
            AuditError::UploadAborted { step, .. } => assert_eq!(step, "insert performance"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(count(&conn, "employees").unwrap(), 0);
        assert_eq!(count(&conn, "holding_companies").unwrap(), 0);
        assert_eq!(count(&conn, "uploads").unwrap(), 0);
    }

    #[test]
    fn test_upload_is_logged() {
        let (_dir, mut conn) = test_db();
        run(&mut conn, &team(), false);
        let (period, by, created): (String, String, i64) = conn
            .query_row(
                "SELECT period, uploaded_by, employees_created FROM uploads",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(period, "2025-03");
        assert_eq!(by, "tester");
        assert_eq!(created, 4);
    }
}
