use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("Invalid upload period (expected YYYY-MM): {0}")]
    InvalidPeriod(String),

    #[error("Invalid pillar answers: {0}")]
    InvalidAnswers(String),

    #[error("Unknown employee: {0}")]
    UnknownEmployee(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Upload aborted during {step}: {source}")]
    UploadAborted {
        step: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

pub type Result<T> = std::result::Result<T, AuditError>;

/// Wrap a storage failure so the caller sees which pipeline step died.
pub fn aborted(step: &'static str) -> impl Fn(rusqlite::Error) -> AuditError {
    move |source| AuditError::UploadAborted { step, source }
}
