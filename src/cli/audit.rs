use comfy_table::{Cell, Table};

use crate::audits::{list_audits, record_audit};
use crate::cli::open_db;
use crate::cli::score::{load_answers, print_score};
use crate::error::Result;
use crate::fmt::{score, zone_label};
use crate::reconciler::parse_period;
use crate::settings::load_settings;

pub fn record(
    file: &str,
    employee: &str,
    auditor: Option<&str>,
    period: Option<&str>,
    json: bool,
) -> Result<()> {
    if let Some(p) = period {
        parse_period(p)?;
    }
    let settings = load_settings();
    let answers = load_answers(file)?;
    let conn = open_db(&settings)?;
    let audit = record_audit(&conn, employee, &settings.identity(auditor), period, &answers)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&audit)?);
    } else {
        println!("Audit #{} recorded for {} ({})", audit.id, audit.employee_name, audit.employee_code);
        print_score(&audit.score);
    }
    Ok(())
}

pub fn history(employee: &str) -> Result<()> {
    let conn = open_db(&load_settings())?;
    let audits = list_audits(&conn, employee)?;
    if audits.is_empty() {
        println!("No audits recorded for {employee}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Period", "Auditor", "A", "B", "C", "Score", "Zone"]);
    for a in &audits {
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(&a.created_at),
            Cell::new(a.period.as_deref().unwrap_or("")),
            Cell::new(&a.auditor),
            Cell::new(score(a.score.category_a)),
            Cell::new(score(a.score.category_b)),
            Cell::new(score(a.score.category_c)),
            Cell::new(score(a.score.total_average)),
            Cell::new(zone_label(a.score.zone)),
        ]);
    }
    println!("{table}");
    Ok(())
}
