//! Command line of the `shoe-stock` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Parser)]
#[command(name = "shoe-stock", version)]
#[command(about = "Stock, sales and payments dashboard over a spreadsheet workbook")]
pub struct Cli {
    /// Directory holding dashboard.db and the logs
    #[arg(short, long, global = true, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Sync the workbook once and log alerts and the summary (default)
    Report,
    /// Store a Sheets access token or connection string in the OS keyring
    Login {
        token: String,
        /// Spreadsheet URL or id; overrides one inside a connection string
        #[arg(short, long)]
        spreadsheet: Option<String>,
    },
    /// Delete the stored Sheets credentials
    Logout,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Report)
    }
}
