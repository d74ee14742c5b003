use rusqlite::OptionalExtension;

use crate::db::{count, get_connection};
use crate::error::Result;
use crate::fmt::rupiah;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("User:       {}", if settings.user_name.is_empty() { "(not set)" } else { &settings.user_name });
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `reality init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    println!();
    for (label, table) in [
        ("Holding companies", "holding_companies"),
        ("CEO units", "ceo_units"),
        ("Branches", "branches"),
        ("Employees", "employees"),
        ("Performance rows", "monthly_performance"),
        ("Audits", "audits"),
        ("Uploads", "uploads"),
    ] {
        println!("{:<19}{}", format!("{label}:"), count(&conn, table)?);
    }

    let total_margin: f64 =
        conn.query_row("SELECT COALESCE(SUM(margin), 0) FROM monthly_performance", [], |r| r.get(0))?;
    println!("{:<19}{}", "Total margin:", rupiah(total_margin));

    let last: Option<(String, String, String)> = conn
        .query_row(
            "SELECT period, uploaded_by, uploaded_at FROM uploads ORDER BY id DESC LIMIT 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    if let Some((period, by, at)) = last {
        println!("{:<19}{period} by {by} at {at}", "Last upload:");
    }
    Ok(())
}
