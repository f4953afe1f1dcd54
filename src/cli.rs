use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Sprint-scheduled kanban task board.
/// Board documents live in ~/.sprintboard or a directory passed via --dir.
#[derive(Parser)]
#[command(name = "sprintboard", version, about = "Personal kanban board with weekly sprint scheduling")]
pub struct Cli {
    /// Store directory holding the board documents.
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Board identifier within the store.
    #[arg(long, global = true)]
    pub board: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}
