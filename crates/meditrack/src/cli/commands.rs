//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::model::{PatientForm, PatientPatch, ReflectionForm};
use crate::shell::Page;
use crate::store::Collection;

/// Consultation commands.
#[derive(Debug, Subcommand)]
pub enum PatientsCommand {
    /// List consultations, newest first
    List {
        /// Only show consultations whose code, reason, or diagnosis contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show one consultation
    Show {
        /// Consultation id
        id: String,
    },

    /// Log a consultation
    Add(PatientArgs),

    /// Change fields of a consultation
    Edit {
        /// Consultation id
        id: String,

        /// Fields to change
        #[command(flatten)]
        changes: PatientEditArgs,
    },

    /// Delete a consultation
    Delete {
        /// Consultation id
        id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Fields for a new consultation.
#[derive(Debug, Args)]
pub struct PatientArgs {
    /// Anonymized patient code, e.g. PAC-001
    #[arg(long = "code")]
    pub anonymous_id: String,

    /// Reason for the consultation
    #[arg(long)]
    pub reason: String,

    /// Consultation date (YYYY-MM-DD, default today)
    #[arg(long)]
    pub date: Option<String>,

    /// Consultation time (HH:MM, default now)
    #[arg(long)]
    pub time: Option<String>,

    /// Diagnosis
    #[arg(long)]
    pub diagnosis: Option<String>,

    /// Treatment
    #[arg(long)]
    pub treatment: Option<String>,

    /// Observations
    #[arg(long)]
    pub observations: Option<String>,

    /// Duration in minutes (default 20)
    #[arg(long)]
    pub duration: Option<String>,

    /// Lessons learned
    #[arg(long)]
    pub lessons: Option<String>,

    /// Category (General, Pediátrico, Crónico, Emergencia, Cirugía, Seguimiento)
    #[arg(long)]
    pub category: Option<String>,

    /// Follow-up date (YYYY-MM-DD)
    #[arg(long)]
    pub follow_up: Option<String>,
}

impl From<PatientArgs> for PatientForm {
    fn from(args: PatientArgs) -> Self {
        Self {
            anonymous_id: args.anonymous_id,
            consultation_date: args.date,
            consultation_time: args.time,
            reason: args.reason,
            diagnosis: args.diagnosis,
            treatment: args.treatment,
            observations: args.observations,
            duration_minutes: args.duration,
            lessons_learned: args.lessons,
            category: args.category,
            follow_up_date: args.follow_up,
        }
    }
}

/// Fields to change on a consultation. Omitted flags keep their value.
#[derive(Debug, Args)]
pub struct PatientEditArgs {
    /// Anonymized patient code
    #[arg(long = "code")]
    pub anonymous_id: Option<String>,

    /// Reason for the consultation
    #[arg(long)]
    pub reason: Option<String>,

    /// Consultation date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,

    /// Consultation time (HH:MM)
    #[arg(long)]
    pub time: Option<String>,

    /// Diagnosis
    #[arg(long)]
    pub diagnosis: Option<String>,

    /// Treatment
    #[arg(long)]
    pub treatment: Option<String>,

    /// Observations
    #[arg(long)]
    pub observations: Option<String>,

    /// Duration in minutes
    #[arg(long)]
    pub duration: Option<String>,

    /// Lessons learned
    #[arg(long)]
    pub lessons: Option<String>,

    /// Category
    #[arg(long)]
    pub category: Option<String>,

    /// Follow-up date (YYYY-MM-DD, empty to clear)
    #[arg(long)]
    pub follow_up: Option<String>,
}

impl From<PatientEditArgs> for PatientPatch {
    fn from(args: PatientEditArgs) -> Self {
        Self {
            anonymous_id: args.anonymous_id,
            consultation_date: args.date,
            consultation_time: args.time,
            reason: args.reason,
            diagnosis: args.diagnosis,
            treatment: args.treatment,
            observations: args.observations,
            duration_minutes: args.duration,
            lessons_learned: args.lessons,
            category: args.category,
            follow_up_date: args.follow_up,
        }
    }
}

/// Goal commands.
#[derive(Debug, Subcommand)]
pub enum GoalsCommand {
    /// List goals
    List {
        /// Only pending goals
        #[arg(long, conflicts_with = "completed")]
        pending: bool,

        /// Only completed goals
        #[arg(long)]
        completed: bool,
    },

    /// Add a goal
    Add {
        /// What you want to achieve
        goal: String,

        /// Target date (YYYY-MM-DD)
        #[arg(short, long)]
        target_date: Option<String>,
    },

    /// Flip a goal between pending and completed
    Toggle {
        /// Goal id
        id: String,
    },

    /// Delete a goal
    Delete {
        /// Goal id
        id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Reflection commands.
#[derive(Debug, Subcommand)]
pub enum ReflectionsCommand {
    /// List reflections, newest first
    List,

    /// Write a reflection
    Add(ReflectionArgs),

    /// Delete a reflection
    Delete {
        /// Reflection id
        id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Fields for a new reflection.
#[derive(Debug, Args)]
pub struct ReflectionArgs {
    /// What you learned
    #[arg(short, long)]
    pub learning: String,

    /// Day the reflection is about (YYYY-MM-DD, default today)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Challenges faced
    #[arg(long)]
    pub challenges: Option<String>,

    /// Achievements
    #[arg(long)]
    pub achievements: Option<String>,
}

impl From<ReflectionArgs> for ReflectionForm {
    fn from(args: ReflectionArgs) -> Self {
        Self {
            date: args.date,
            learning: args.learning,
            challenges: args.challenges,
            achievements: args.achievements,
        }
    }
}

/// Dashboard command arguments.
#[derive(Debug, Args)]
pub struct DashboardCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Histogram window in days (overrides configuration)
    #[arg(long)]
    pub days: Option<u32>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Page argument for `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PageArg {
    /// Dashboard
    Dashboard,
    /// Patients
    Patients,
    /// Reflections
    Reflections,
    /// Goals
    Goals,
}

impl From<PageArg> for Page {
    fn from(arg: PageArg) -> Self {
        match arg {
            PageArg::Dashboard => Self::Dashboard,
            PageArg::Patients => Self::Patients,
            PageArg::Reflections => Self::Reflections,
            PageArg::Goals => Self::Goals,
        }
    }
}

/// Collection argument for `watch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollectionArg {
    /// Consultations
    Patients,
    /// Professional goals
    Goals,
    /// Reflections
    Reflections,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::Patients => Self::Patients,
            CollectionArg::Goals => Self::ProfessionalGoals,
            CollectionArg::Reflections => Self::Reflections,
        }
    }
}

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One record per block
    Plain,
    /// Aligned columns
    #[default]
    Table,
    /// JSON output
    Json,
}
