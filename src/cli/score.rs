use std::path::Path;

use comfy_table::{Cell, Table};

use crate::error::{AuditError, Result};
use crate::fmt::{score, zone_label};
use crate::scoring::{Category, PillarAnswer, RealityScore};

pub(crate) fn load_answers(file: &str) -> Result<Vec<PillarAnswer>> {
    let content = std::fs::read_to_string(Path::new(file))?;
    serde_json::from_str(&content)
        .map_err(|e| AuditError::InvalidAnswers(format!("{file}: {e}")))
}

pub(crate) fn print_score(result: &RealityScore) {
    let mut table = Table::new();
    table.set_header(vec!["Category", "Average"]);
    for category in Category::ALL {
        table.add_row(vec![
            Cell::new(format!("{:?} ({})", category, category.label())),
            Cell::new(score(result.category(category))),
        ]);
    }
    table.add_row(vec![Cell::new("Reality Score"), Cell::new(score(result.total_average))]);
    println!("{table}");
    println!("Zone: {}", zone_label(result.zone));
}

pub fn run(file: &str, json: bool) -> Result<()> {
    let answers = load_answers(file)?;
    let result = RealityScore::from_answers(&answers)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_score(&result);
    }
    Ok(())
}
