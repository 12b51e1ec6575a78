//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::adjust::AdjustArgs;
use crate::commands::estimate::EstimateAction;
use crate::commands::export::ExportArgs;
use crate::commands::report::ReportArgs;
use crate::commands::reset::ResetArgs;
use crate::commands::status::StatusArgs;
use crate::commands::stop_all::StopAllArgs;
use crate::commands::timer::TimerArgs;
use crate::commands::watch::WatchArgs;

/// Time tracking and estimates for cards on a shared board.
///
/// Each member runs their own timers and keeps their own estimate per card.
/// Reports compare estimated and actual effort across the board.
#[derive(Debug, Parser)]
#[command(name = "ct", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a timer on a card.
    Start(TimerArgs),

    /// Stop the running timer on a card and record the time.
    Stop(TimerArgs),

    /// Start the timer if it is stopped, stop it if it is running.
    Toggle(TimerArgs),

    /// Add or remove time by hand.
    Adjust(AdjustArgs),

    /// Remove all recorded time on a card, for every member.
    Reset(ResetArgs),

    /// Stop running timers on the board.
    StopAll(StopAllArgs),

    /// Show time, estimates and running timers.
    Status(StatusArgs),

    /// Manage effort estimates.
    Estimate {
        #[command(subcommand)]
        action: EstimateAction,
    },

    /// Compare estimated and actual time.
    Report(ReportArgs),

    /// Export report rows as CSV or JSON.
    Export(ExportArgs),

    /// Follow live totals on a card.
    Watch(WatchArgs),
}
