//! Domain views.
//!
//! One view per collection plus the dashboard. Views never share state: each
//! fetches its own owner-filtered list and re-fetches after every write it
//! makes. Only the dashboard reads more than one collection.

mod dashboard;
mod goals;
mod patients;
mod reflections;
mod view;

pub use dashboard::{compute_stats, Dashboard, DashboardStats, DayBucket, NO_CATEGORY};
pub use goals::GoalsView;
pub use patients::PatientsView;
pub use reflections::ReflectionsView;
pub use view::{CollectionView, Confirm, Notice, NoticeLevel, ViewState};
