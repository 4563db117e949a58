//! `meditrack` - A clinical practice journal
//!
//! This library provides the record model, the document store, the identity
//! bridge, and the journal views behind the `meditrack` binary: a log of
//! anonymized patient consultations, professional goals, daily reflections,
//! and a dashboard summarizing them.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod journal;
pub mod logging;
pub mod model;
pub mod shell;
pub mod store;

pub use auth::{IdentityProvider, SessionIdentityProvider};
pub use config::Config;
pub use error::{Error, FailureKind, Result};
pub use logging::init_logging;
pub use shell::{Page, Shell};
pub use store::{Collection, RecordStore, SqliteStore, StoreStats};
