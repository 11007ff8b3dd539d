//! Domain models

mod issue;
mod report;
mod transition;

pub use issue::{Issue, IssueStatus};
pub use report::IssueReport;
pub use transition::TransitionRecord;
