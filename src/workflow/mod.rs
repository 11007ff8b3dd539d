//! Issue workflow: state machine, persistence seam, transition execution.

mod machine;
mod service;
mod store;

pub use machine::{allowed_transitions, validate_transition};
pub use service::WorkflowService;
pub use store::{CommitError, CommitResult, InMemoryIssueStore, IssueStore};
