use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{AuditError, Result};
use crate::scoring::{PillarAnswer, RealityScore, Zone};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: i64,
    pub employee_code: String,
    pub employee_name: String,
    pub auditor: String,
    pub period: Option<String>,
    pub score: RealityScore,
    pub created_at: String,
}

/// Score `answers` and store the result against an employee.
pub fn record_audit(
    conn: &Connection,
    employee_code: &str,
    auditor: &str,
    period: Option<&str>,
    answers: &[PillarAnswer],
) -> Result<AuditRecord> {
    let score = RealityScore::from_answers(answers)?;

    let (employee_id, employee_name): (i64, String) = conn
        .query_row(
            "SELECT id, full_name FROM employees WHERE employee_code = ?1",
            [employee_code],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| AuditError::UnknownEmployee(employee_code.to_string()))?;

    conn.execute(
        "INSERT INTO audits (employee_id, employee_code, employee_name, auditor, period, answers, \
         score_a, score_b, score_c, total_average, zone) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            employee_id,
            employee_code,
            employee_name,
            auditor,
            period,
            serde_json::to_string(answers)?,
            score.category_a,
            score.category_b,
            score.category_c,
            score.total_average,
            score.zone.as_str(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(id, employee = employee_code, zone = %score.zone, "audit recorded");

    let created_at: String =
        conn.query_row("SELECT created_at FROM audits WHERE id = ?1", [id], |r| r.get(0))?;
    Ok(AuditRecord {
        id,
        employee_code: employee_code.to_string(),
        employee_name,
        auditor: auditor.to_string(),
        period: period.map(str::to_string),
        score,
        created_at,
    })
}

/// Stored audits for one employee code, newest first.
pub fn list_audits(conn: &Connection, employee_code: &str) -> Result<Vec<AuditRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, employee_code, employee_name, auditor, period, score_a, score_b, score_c, \
         total_average, zone, created_at FROM audits WHERE employee_code = ?1 \
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([employee_code], |row| {
            let zone: String = row.get(9)?;
            Ok(AuditRecord {
                id: row.get(0)?,
                employee_code: row.get(1)?,
                employee_name: row.get(2)?,
                auditor: row.get(3)?,
                period: row.get(4)?,
                score: RealityScore {
                    category_a: row.get(5)?,
                    category_b: row.get(6)?,
                    category_c: row.get(7)?,
                    total_average: row.get(8)?,
                    zone: Zone::from_str_opt(&zone).unwrap_or(Zone::Critical),
                },
                created_at: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count, test_db};
    use crate::scoring::Pillar;

    fn add_employee(conn: &Connection, code: &str, name: &str) {
        conn.execute(
            "INSERT OR IGNORE INTO holding_companies (id, code, name) VALUES (1, 'SGB', 'PT SGB')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO branches (id, code, holding_company_id) VALUES (1, 'AB', 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO employees (employee_code, full_name, date_of_birth, holding_company_id, branch_id, position_id) \
             VALUES (?1, ?2, '1990-01-15', 1, 1, 1)",
            rusqlite::params![code, name],
        )
        .unwrap();
    }

    fn answers(score: u8) -> Vec<PillarAnswer> {
        Pillar::ALL.iter().map(|p| PillarAnswer::new(*p, score)).collect()
    }

    #[test]
    fn test_record_and_list() {
        let (_dir, conn) = test_db();
        add_employee(&conn, "AB001", "Ani [AB001]");
        let first = record_audit(&conn, "AB001", "Rina", Some("2025-03"), &answers(4)).unwrap();
        assert_eq!(first.score.zone, Zone::Success);
        assert_eq!(first.employee_name, "Ani [AB001]");
        record_audit(&conn, "AB001", "Rina", None, &answers(2)).unwrap();

        let history = list_audits(&conn, "AB001").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].score.zone, Zone::Critical);
        assert_eq!(history[1].period.as_deref(), Some("2025-03"));
    }

    #[test]
    fn test_unknown_employee() {
        let (_dir, conn) = test_db();
        let err = record_audit(&conn, "NOPE", "Rina", None, &answers(3)).unwrap_err();
        assert!(matches!(err, AuditError::UnknownEmployee(_)));
    }

    #[test]
    fn test_invalid_answers_not_stored() {
        let (_dir, conn) = test_db();
        add_employee(&conn, "AB001", "Ani");
        let err = record_audit(&conn, "AB001", "Rina", None, &answers(3)[..17]).unwrap_err();
        assert!(matches!(err, AuditError::InvalidAnswers(_)));
        assert_eq!(count(&conn, "audits").unwrap(), 0);
    }

    #[test]
    fn test_audit_survives_employee_deletion() {
        let (_dir, conn) = test_db();
        add_employee(&conn, "AB001", "Ani");
        record_audit(&conn, "AB001", "Rina", None, &answers(5)).unwrap();
        conn.execute("DELETE FROM employees", []).unwrap();
        let history = list_audits(&conn, "AB001").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].score.total_average, 5.0);
    }
}
