use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Represents an issue record raised against a vehicle under test
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Issue {
    /// Unique identifier
    pub id: Uuid,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Current workflow status
    pub status: IssueStatus,

    /// Human-readable title
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    /// Detailed description
    pub description: String,

    /// Reporting user or system
    #[validate(length(min = 1, max = 255))]
    pub reporter: String,

    /// Vehicle identification number, when the issue is tied to a vehicle
    pub vin: Option<String>,

    /// Monotonic version used for optimistic concurrency on status updates
    #[serde(default)]
    pub version: u64,

    /// Extra untyped attributes carried through from the reporting source
    #[serde(flatten)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Issue {
    /// Create a new issue in the default initial status
    pub fn new(title: String, description: String, reporter: String, vin: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            status: IssueStatus::default(),
            title,
            description,
            reporter,
            vin,
            version: 0,
            attributes: HashMap::new(),
        }
    }

    /// Check if the issue can still move through the workflow
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Closed enumeration of issue lifecycle states
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, Default,
)]
pub enum IssueStatus {
    #[default]
    New,
    Triage,
    Assigned,
    InProgress,
    Fixed,
    RegressionTracking,
    Closed,
    Reopened,
    Rejected,
}

impl IssueStatus {
    /// Terminal states admit no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, IssueStatus::Closed | IssueStatus::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_issue_creation() {
        let issue = Issue::new(
            "Brake telemetry dropout".to_string(),
            "Frames missing during track run".to_string(),
            "test-rig-7".to_string(),
            Some("WVWZZZ1JZXW000001".to_string()),
        );

        assert_eq!(issue.status, IssueStatus::New);
        assert_eq!(issue.version, 0);
        assert!(issue.is_open());
    }

    #[test]
    fn test_terminal_states() {
        assert!(IssueStatus::Closed.is_terminal());
        assert!(IssueStatus::Rejected.is_terminal());
        assert!(!IssueStatus::New.is_terminal());
        assert!(!IssueStatus::Reopened.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        let status = IssueStatus::from_str("RegressionTracking").unwrap();
        assert_eq!(status, IssueStatus::RegressionTracking);
        assert_eq!(status.to_string(), "RegressionTracking");
        assert!(IssueStatus::from_str("Bogus").is_err());
    }

    #[test]
    fn test_extra_attributes_survive_round_trip() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "created_at": Utc::now(),
            "updated_at": Utc::now(),
            "status": "Triage",
            "title": "t",
            "description": "d",
            "reporter": "r",
            "vin": null,
            "version": 3,
            "track_segment": "S2",
            "ambient_temp_c": 21.5,
        });

        let issue: Issue = serde_json::from_value(json).unwrap();
        assert_eq!(issue.status, IssueStatus::Triage);
        assert_eq!(issue.attributes["track_segment"], "S2");
        assert_eq!(issue.attributes["ambient_temp_c"], 21.5);
    }
}
