use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS holding_companies (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS ceo_units (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    code TEXT NOT NULL,
    holding_company_id INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (holding_company_id) REFERENCES holding_companies(id)
);

CREATE TABLE IF NOT EXISTS branches (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    holding_company_id INTEGER NOT NULL,
    ceo_unit_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (holding_company_id) REFERENCES holding_companies(id),
    FOREIGN KEY (ceo_unit_id) REFERENCES ceo_units(id)
);

CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    level INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS employees (
    id INTEGER PRIMARY KEY,
    employee_code TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    email TEXT UNIQUE,
    date_of_birth TEXT NOT NULL,
    holding_company_id INTEGER NOT NULL,
    branch_id INTEGER NOT NULL,
    position_id INTEGER NOT NULL,
    manager_id INTEGER,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'freelance', 'resigned')),
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (holding_company_id) REFERENCES holding_companies(id),
    FOREIGN KEY (branch_id) REFERENCES branches(id),
    FOREIGN KEY (position_id) REFERENCES positions(id),
    FOREIGN KEY (manager_id) REFERENCES employees(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS monthly_performance (
    id INTEGER PRIMARY KEY,
    employee_id INTEGER NOT NULL,
    month TEXT NOT NULL,
    margin REAL NOT NULL DEFAULT 0,
    new_accounts INTEGER NOT NULL DEFAULT 0,
    UNIQUE (employee_id, month),
    FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY,
    filename TEXT,
    checksum TEXT,
    period TEXT NOT NULL,
    uploaded_by TEXT NOT NULL,
    overwrite INTEGER NOT NULL DEFAULT 0,
    employees_created INTEGER NOT NULL DEFAULT 0,
    employees_updated INTEGER NOT NULL DEFAULT 0,
    performance_records INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0,
    uploaded_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS audits (
    id INTEGER PRIMARY KEY,
    employee_id INTEGER,
    employee_code TEXT NOT NULL,
    employee_name TEXT NOT NULL,
    auditor TEXT NOT NULL,
    period TEXT,
    answers TEXT NOT NULL,
    score_a REAL NOT NULL,
    score_b REAL NOT NULL,
    score_c REAL NOT NULL,
    total_average REAL NOT NULL,
    zone TEXT NOT NULL CHECK (zone IN ('success', 'warning', 'critical')),
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_employees_manager ON employees(manager_id);
CREATE INDEX IF NOT EXISTS idx_audits_employee_code ON audits(employee_code);
";

// (code, name, level)
const DEFAULT_POSITIONS: &[(&str, &str, i64)] = &[
    ("CEO", "Chief Executive Officer", 1),
    ("BM", "Branch Manager", 2),
    ("SBM", "Senior Business Manager", 3),
    ("EM", "Executive Manager", 4),
    ("KSPV", "Kepala Supervisor", 5),
    ("SPV", "Supervisor", 6),
    ("MKT", "Marketing", 7),
    ("ADM", "Administrasi", 7),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM positions", [], |row| row.get(0))?;
    if count == 0 {
        for (code, name, level) in DEFAULT_POSITIONS {
            conn.execute(
                "INSERT INTO positions (code, name, level) VALUES (?1, ?2, ?3)",
                rusqlite::params![code, name, level],
            )?;
        }
    }
    Ok(())
}

pub fn count(conn: &Connection, table: &str) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?)
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &[
            "holding_companies",
            "ceo_units",
            "branches",
            "positions",
            "employees",
            "monthly_performance",
            "uploads",
            "audits",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
        assert_eq!(count(&conn, "positions").unwrap(), DEFAULT_POSITIONS.len() as i64);
    }

    #[test]
    fn test_positions_seeded_with_levels() {
        let (_dir, conn) = test_db();
        let level: i64 = conn
            .query_row("SELECT level FROM positions WHERE code = 'BM'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(level, 2);
    }

    #[test]
    fn test_status_check_constraint() {
        let (_dir, conn) = test_db();
        conn.execute("INSERT INTO holding_companies (code, name) VALUES ('SGB', 'PT SGB')", []).unwrap();
        conn.execute("INSERT INTO branches (code, holding_company_id) VALUES ('AB', 1)", []).unwrap();
        let err = conn.execute(
            "INSERT INTO employees (employee_code, full_name, date_of_birth, holding_company_id, branch_id, position_id, status) \
             VALUES ('X1', 'X', '1900-01-01', 1, 1, 1, 'retired')",
            [],
        );
        assert!(err.is_err());
    }
}
