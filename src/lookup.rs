use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

/// A holding company reachable from a branch-code prefix letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingCompanyEntry {
    pub code: String,
    pub name: String,
    pub ceo_unit: String,
}

/// Static tables the parser and the upload engine consult. Built once
/// (default or from JSON) and passed down by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupTables {
    /// Branch-code first letter → holding company.
    pub prefixes: HashMap<String, HoldingCompanyEntry>,
    /// Position label (uppercased) → canonical position code.
    pub position_aliases: HashMap<String, String>,
}

// (prefix, code, name, ceo unit)
const DEFAULT_PREFIXES: &[(char, &str, &str, &str)] = &[
    ('A', "SGB", "PT Solid Gold Berjangka", "CEO Unit SGB"),
    ('B', "RFB", "PT Rifan Financindo Berjangka", "CEO Unit RFB"),
    ('C', "KPF", "PT Kontak Perkasa Futures", "CEO Unit KPF"),
    ('D', "EWF", "PT Equityworld Futures", "CEO Unit EWF"),
    ('E', "BPF", "PT Best Profit Futures", "CEO Unit BPF"),
];

// (alias, canonical code)
const DEFAULT_POSITION_ALIASES: &[(&str, &str)] = &[
    ("CEO", "CEO"),
    ("BM", "BM"),
    ("BRM", "BM"),
    ("BRANCH MANAGER", "BM"),
    ("SBM", "SBM"),
    ("EM", "EM"),
    ("KSPV", "KSPV"),
    ("KSM", "KSPV"),
    ("SPV", "SPV"),
    ("SUPERVISOR", "SPV"),
    ("MKT", "MKT"),
    ("MARKETING", "MKT"),
    ("ADM", "ADM"),
    ("ADMIN", "ADM"),
];

impl Default for LookupTables {
    fn default() -> Self {
        let prefixes = DEFAULT_PREFIXES
            .iter()
            .map(|(prefix, code, name, ceo_unit)| {
                (
                    prefix.to_string(),
                    HoldingCompanyEntry {
                        code: code.to_string(),
                        name: name.to_string(),
                        ceo_unit: ceo_unit.to_string(),
                    },
                )
            })
            .collect();
        let position_aliases = DEFAULT_POSITION_ALIASES
            .iter()
            .map(|(alias, code)| (alias.to_string(), code.to_string()))
            .collect();
        Self {
            prefixes,
            position_aliases,
        }
    }
}

impl LookupTables {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut tables: LookupTables = serde_json::from_str(&content)
            .map_err(|e| AuditError::Settings(format!("{}: {e}", path.display())))?;
        // Keys are matched uppercased; normalize whatever the file used.
        tables.prefixes = tables
            .prefixes
            .into_iter()
            .map(|(prefix, entry)| (prefix.trim().to_uppercase(), entry))
            .collect();
        tables.position_aliases = tables
            .position_aliases
            .into_iter()
            .map(|(alias, code)| (alias.trim().to_uppercase(), code))
            .collect();
        Ok(tables)
    }

    pub fn holding_company_for(&self, branch_code: &str) -> Option<&HoldingCompanyEntry> {
        let first = branch_code.chars().next()?;
        self.prefixes.get(&first.to_ascii_uppercase().to_string())
    }

    pub fn canonical_position(&self, label: &str) -> Option<&str> {
        self.position_aliases
            .get(&label.trim().to_uppercase())
            .map(String::as_str)
    }
}
