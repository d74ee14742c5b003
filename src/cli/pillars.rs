use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::scoring::Pillar;

pub fn run() -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Pillar", "Category"]);
    for p in Pillar::ALL {
        let category = p.category();
        table.add_row(vec![
            Cell::new(p.id()),
            Cell::new(p.name()),
            Cell::new(format!("{:?} ({})", category, category.label())),
        ]);
    }
    println!("{table}");
    Ok(())
}
