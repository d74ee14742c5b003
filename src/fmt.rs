use colored::{ColoredString, Colorize};

use crate::scoring::Zone;

/// Format a float as Rupiah with dot thousands separators: Rp1.234.567
pub fn rupiah(val: f64) -> String {
    let negative = val < 0.0;
    let whole = format!("{:.0}", val.abs());

    let mut with_dots = String::new();
    for (i, c) in whole.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_dots.push('.');
        }
        with_dots.push(c);
    }
    let with_dots: String = with_dots.chars().rev().collect();

    if negative {
        format!("-Rp{with_dots}")
    } else {
        format!("Rp{with_dots}")
    }
}

/// Two-decimal score, e.g. 3.94
pub fn score(val: f64) -> String {
    format!("{val:.2}")
}

pub fn zone_label(zone: Zone) -> ColoredString {
    let label = zone.as_str().to_uppercase();
    match zone {
        Zone::Success => label.green().bold(),
        Zone::Warning => label.yellow().bold(),
        Zone::Critical => label.red().bold(),
    }
}
