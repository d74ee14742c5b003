use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::settings::load_settings;

pub fn run(branch: Option<&str>) -> Result<()> {
    let conn = open_db(&load_settings())?;
    let branch = branch.map(|b| b.trim().to_uppercase());
    let mut stmt = conn.prepare(
        "SELECT e.employee_code, e.full_name, b.code, p.code, m.full_name, e.email, e.status \
         FROM employees e \
         JOIN branches b ON e.branch_id = b.id \
         JOIN positions p ON e.position_id = p.id \
         LEFT JOIN employees m ON e.manager_id = m.id \
         WHERE ?1 IS NULL OR b.code = ?1 \
         ORDER BY b.code, p.level, e.full_name",
    )?;
    let rows: Vec<(String, String, String, String, Option<String>, Option<String>, String)> = stmt
        .query_map([&branch], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        println!("No employees found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Code", "Name", "Branch", "Position", "Manager", "Email", "Status"]);
    for (code, name, branch, position, manager, email, status) in &rows {
        table.add_row(vec![
            Cell::new(code),
            Cell::new(name),
            Cell::new(branch),
            Cell::new(position),
            Cell::new(manager.as_deref().unwrap_or("")),
            Cell::new(email.as_deref().unwrap_or("")),
            Cell::new(status),
        ]);
    }
    println!("{table}");
    println!("{} employees", rows.len());
    Ok(())
}
