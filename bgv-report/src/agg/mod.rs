//! Aggregation pipeline
//!
//! The reporting entry points walk an application's dynamically-configured
//! per-service tables and fold the scattered rows into nested summaries.
//! Connectivity failures propagate; schema drift (missing tables/columns,
//! unparseable descriptors) degrades to "no contribution" per service, so
//! one stale form definition never blanks a whole report.

pub mod applications;
pub mod attachments;
pub mod core;
pub mod invoice;
pub mod tracker;

/// Which application table a read targets; picks the foreign-key column
/// used by the per-service dynamic tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicantKind {
    Candidate,
    Client,
}

impl ApplicantKind {
    /// Foreign-key column in dynamic per-service tables
    pub fn fk_column(self) -> &'static str {
        match self {
            ApplicantKind::Candidate => "candidate_application_id",
            ApplicantKind::Client => "client_application_id",
        }
    }
}
