use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::lookup::LookupTables;
use crate::parser::DateSystem;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub date_system: DateSystem,
    #[serde(default)]
    pub batch: BatchLimits,
    /// Optional JSON file replacing the built-in prefix/alias tables.
    #[serde(default)]
    pub lookup_tables: Option<String>,
}

/// Upper bounds on rows (or ids) per statement during an upload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchLimits {
    #[serde(default = "default_employee_insert")]
    pub employee_insert: usize,
    #[serde(default = "default_performance_insert")]
    pub performance_insert: usize,
    #[serde(default = "default_performance_delete")]
    pub performance_delete: usize,
}

fn default_employee_insert() -> usize {
    500
}

fn default_performance_insert() -> usize {
    1000
}

fn default_performance_delete() -> usize {
    500
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            employee_insert: default_employee_insert(),
            performance_insert: default_performance_insert(),
            performance_delete: default_performance_delete(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            user_name: String::new(),
            date_system: DateSystem::default(),
            batch: BatchLimits::default(),
            lookup_tables: None,
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("reality.db")
    }

    /// Built-in tables unless `lookup_tables` points at an override file.
    pub fn lookup_tables(&self) -> Result<LookupTables> {
        match &self.lookup_tables {
            Some(path) => LookupTables::load(&PathBuf::from(shellexpand_path(path))),
            None => Ok(LookupTables::default()),
        }
    }

    /// Identity recorded on uploads and audits when none is given explicitly.
    pub fn identity(&self, explicit: Option<&str>) -> String {
        match explicit {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ if !self.user_name.is_empty() => self.user_name.clone(),
            _ => "system".to_string(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("reality-audit")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("reality-audit")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| AuditError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
