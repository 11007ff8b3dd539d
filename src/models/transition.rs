use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::IssueStatus;

/// Immutable audit entry capturing one validated state change.
///
/// Records are append-only; the full sequence for an issue is its audit
/// trail, and the most recent record's `to_status` is the issue's current
/// status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Unique identifier
    pub id: Uuid,

    /// Issue this transition belongs to
    pub issue_id: Uuid,

    /// Status the issue held before the transition
    pub from_status: IssueStatus,

    /// Status the issue holds after the transition
    pub to_status: IssueStatus,

    /// User or system that triggered the transition
    pub triggered_by: String,

    /// Optional free-form reason
    pub reason: Option<String>,

    /// Optional structured metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl TransitionRecord {
    pub fn new(
        issue_id: Uuid,
        from_status: IssueStatus,
        to_status: IssueStatus,
        triggered_by: String,
        reason: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            issue_id,
            from_status,
            to_status,
            triggered_by,
            reason,
            metadata,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_record_creation() {
        let issue_id = Uuid::new_v4();
        let record = TransitionRecord::new(
            issue_id,
            IssueStatus::New,
            IssueStatus::Triage,
            "triager@fleet".to_string(),
            Some("initial triage".to_string()),
            HashMap::new(),
        );

        assert_eq!(record.issue_id, issue_id);
        assert_eq!(record.from_status, IssueStatus::New);
        assert_eq!(record.to_status, IssueStatus::Triage);
        assert!(record.reason.is_some());
    }
}
