pub mod audit;
pub mod employees;
pub mod init;
pub mod pillars;
pub mod score;
pub mod status;
pub mod upload;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::Settings;

/// Open (and if needed create) the database the settings point at.
pub(crate) fn open_db(settings: &Settings) -> Result<Connection> {
    std::fs::create_dir_all(&settings.data_dir)?;
    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    Ok(conn)
}

#[derive(Parser)]
#[command(name = "reality", about = "Employee performance audits and bulk org-data uploads.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for data (default: ~/Documents/reality-audit)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Name recorded as uploader/auditor when none is given
        #[arg(long = "user-name")]
        user_name: Option<String>,
    },
    /// Upload an employee spreadsheet (XLSX/XLS/ODS/CSV).
    Upload {
        /// Path to the spreadsheet
        file: String,
        /// Upload period: YYYY-MM
        #[arg(long)]
        period: String,
        /// Replace all employees and the period year's performance data
        #[arg(long)]
        overwrite: bool,
        /// Uploader identity (default: configured user name)
        #[arg(long)]
        uploader: Option<String>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compute a Reality Score from an answers file without storing it.
    Score {
        /// JSON array of {"pillarId", "score"} objects
        file: String,
        #[arg(long)]
        json: bool,
    },
    /// Score an employee and store the audit.
    Audit {
        /// JSON array of {"pillarId", "score"} objects
        file: String,
        /// Employee code, e.g. AB001
        #[arg(long)]
        employee: String,
        /// Auditor identity (default: configured user name)
        #[arg(long)]
        auditor: Option<String>,
        /// Audit period: YYYY-MM
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show stored audits for an employee.
    AuditHistory {
        /// Employee code
        employee: String,
    },
    /// List employees.
    Employees {
        /// Only this branch code
        #[arg(long)]
        branch: Option<String>,
    },
    /// List the 18 scoring pillars.
    Pillars,
    /// Show current database and summary statistics.
    Status,
}
