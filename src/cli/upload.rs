use std::path::{Path, PathBuf};

use comfy_table::{Cell, Table};
use sha2::{Digest, Sha256};

use crate::cli::open_db;
use crate::error::Result;
use crate::models::UploadSummary;
use crate::parser::{read_rows, RowParser};
use crate::reconciler::{parse_period, UploadEngine, UploadRequest};
use crate::settings::load_settings;

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

pub fn run(file: &str, period: &str, overwrite: bool, uploader: Option<&str>, json: bool) -> Result<()> {
    parse_period(period)?;
    let settings = load_settings();
    let tables = settings.lookup_tables()?;
    let file_path = PathBuf::from(file);

    let rows = read_rows(&file_path)?;
    let batch = RowParser::new(&tables)
        .with_date_system(settings.date_system)
        .parse_rows(&rows);
    let checksum = compute_checksum(&file_path)?;
    let uploaded_by = settings.identity(uploader);

    let mut conn = open_db(&settings)?;
    let request = UploadRequest {
        period,
        overwrite_existing: overwrite,
        uploaded_by: &uploaded_by,
        source_file: file_path.file_name().and_then(|n| n.to_str()),
        checksum: Some(&checksum),
    };
    let summary = UploadEngine::new(&tables)
        .with_limits(settings.batch)
        .run(&mut conn, &batch, &request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &UploadSummary) {
    let mut table = Table::new();
    table.set_header(vec!["", "Count"]);
    let counts = [
        ("Holding companies created", summary.holding_companies_created),
        ("CEO units created", summary.ceo_units_created),
        ("Branches created", summary.branches_created),
        ("Employees deleted", summary.employees_deleted),
        ("Employees created", summary.employees_created),
        ("Employees updated", summary.employees_updated),
        ("Performance records", summary.performance_records_created),
        ("Hierarchy links", summary.hierarchy_links),
        ("Email conflicts", summary.email_conflicts),
    ];
    for (label, n) in counts {
        table.add_row(vec![Cell::new(label), Cell::new(n)]);
    }
    println!("{table}");

    if !summary.row_errors.is_empty() {
        println!("\nRejected rows:");
        let mut table = Table::new();
        table.set_header(vec!["Row", "Message"]);
        for e in &summary.row_errors {
            table.add_row(vec![Cell::new(e.row), Cell::new(&e.message)]);
        }
        println!("{table}");
    }

    for (title, issues) in [
        ("Employee errors", &summary.errors),
        ("Skipped manager links", &summary.skipped_links),
        ("Warnings", &summary.warnings),
    ] {
        if issues.is_empty() {
            continue;
        }
        println!("\n{title}:");
        let mut table = Table::new();
        table.set_header(vec!["Employee", "Message"]);
        for issue in issues {
            table.add_row(vec![Cell::new(&issue.employee_name), Cell::new(&issue.message)]);
        }
        println!("{table}");
    }
}
