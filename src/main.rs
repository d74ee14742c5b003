mod audits;
mod cli;
mod db;
mod error;
mod fmt;
mod lookup;
mod models;
mod parser;
mod reconciler;
mod scoring;
mod settings;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("REALITY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            data_dir,
            user_name,
        } => cli::init::run(data_dir, user_name),
        Commands::Upload {
            file,
            period,
            overwrite,
            uploader,
            json,
        } => cli::upload::run(&file, &period, overwrite, uploader.as_deref(), json),
        Commands::Score { file, json } => cli::score::run(&file, json),
        Commands::Audit {
            file,
            employee,
            auditor,
            period,
            json,
        } => cli::audit::record(&file, &employee, auditor.as_deref(), period.as_deref(), json),
        Commands::AuditHistory { employee } => cli::audit::history(&employee),
        Commands::Employees { branch } => cli::employees::run(branch.as_deref()),
        Commands::Pillars => cli::pillars::run(),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
