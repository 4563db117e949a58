//! Command-line interface for meditrack.
//!
//! This module provides the CLI structure and output rendering for the
//! `meditrack` binary.

mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CollectionArg, ConfigCommand, DashboardCommand, GoalsCommand, OutputFormat, PageArg,
    PatientArgs, PatientEditArgs, PatientsCommand, ReflectionArgs, ReflectionsCommand,
    StatusCommand,
};

use crate::logging::Verbosity;

/// meditrack - A clinical practice journal
///
/// Log anonymized patient consultations, track professional goals, and write
/// daily reflections, with a dashboard summarizing your practice.
#[derive(Debug, Parser)]
#[command(name = "meditrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format for listings
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in
    Login,

    /// Sign out
    Logout,

    /// Show the signed-in identity
    Whoami,

    /// Show the navigation rail with a page selected, then the page
    Open {
        /// Page to open
        #[arg(value_enum)]
        page: PageArg,
    },

    /// Manage patient consultations
    #[command(subcommand)]
    Patients(PatientsCommand),

    /// Manage professional goals
    #[command(subcommand)]
    Goals(GoalsCommand),

    /// Manage daily reflections
    #[command(subcommand)]
    Reflections(ReflectionsCommand),

    /// Show practice statistics
    Dashboard(DashboardCommand),

    /// Print a collection every time it changes
    Watch {
        /// Collection to watch
        #[arg(value_enum)]
        collection: CollectionArg,
    },

    /// Show database and session status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
