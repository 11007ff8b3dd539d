//! Issue persistence seam.
//!
//! The backing document store is an external collaborator; this module
//! defines the contract the workflow service needs (unique `issue_id` index,
//! versioned compare-and-set status commit, append-only transition log) and
//! an in-memory implementation for tests and single-node deployments.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Issue, IssueStatus, TransitionRecord};

use super::machine::allowed_transitions;

/// Failure modes of a compare-and-set transition commit
#[derive(Debug)]
pub enum CommitError {
    /// No issue with the given id
    NotFound,
    /// Expected version did not match; carries the current entity so the
    /// caller can report against fresh state without another round-trip
    VersionConflict(Box<Issue>),
    /// Backend failure
    Storage(String),
}

pub type CommitResult = std::result::Result<Issue, CommitError>;

/// Store contract consumed by the workflow service
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Insert a new issue; `issue_id` is uniquely indexed
    async fn insert_issue(&self, issue: &Issue) -> Result<()>;

    /// Fetch an issue by id
    async fn get_issue(&self, id: &Uuid) -> Result<Option<Issue>>;

    /// Atomically: verify the issue's version matches `expected_version`,
    /// update status + timestamp, bump the version, and append exactly one
    /// transition record. The record is never mutated or deleted afterwards.
    async fn commit_transition(
        &self,
        issue_id: &Uuid,
        expected_version: u64,
        record: TransitionRecord,
    ) -> CommitResult;

    /// Full audit trail for an issue, oldest first
    async fn list_transitions(&self, issue_id: &Uuid) -> Result<Vec<TransitionRecord>>;
}

/// In-memory issue store
#[derive(Clone, Default)]
pub struct InMemoryIssueStore {
    issues: Arc<DashMap<Uuid, Issue>>,
    transitions: Arc<DashMap<Uuid, Vec<TransitionRecord>>>,
}

impl InMemoryIssueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IssueStore for InMemoryIssueStore {
    async fn insert_issue(&self, issue: &Issue) -> Result<()> {
        match self.issues.entry(issue.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AppError::Validation(format!(
                "Issue {} already exists",
                issue.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(issue.clone());
                tracing::debug!(issue_id = %issue.id, "Issue saved");
                Ok(())
            }
        }
    }

    async fn get_issue(&self, id: &Uuid) -> Result<Option<Issue>> {
        Ok(self.issues.get(id).map(|entry| entry.clone()))
    }

    async fn commit_transition(
        &self,
        issue_id: &Uuid,
        expected_version: u64,
        record: TransitionRecord,
    ) -> CommitResult {
        let mut entry = match self.issues.get_mut(issue_id) {
            Some(entry) => entry,
            None => return Err(CommitError::NotFound),
        };

        if entry.version != expected_version {
            return Err(CommitError::VersionConflict(Box::new(entry.clone())));
        }

        // Write-boundary backstop; the state machine has already validated
        if !allowed_transitions(entry.status).contains(&record.to_status)
            || entry.status != record.from_status
        {
            return Err(CommitError::Storage(format!(
                "transition record {} -> {} inconsistent with stored status {}",
                record.from_status, record.to_status, entry.status
            )));
        }

        entry.status = record.to_status;
        entry.updated_at = Utc::now();
        entry.version += 1;
        let updated = entry.clone();
        drop(entry);

        self.transitions
            .entry(*issue_id)
            .or_default()
            .push(record);

        tracing::debug!(
            issue_id = %issue_id,
            status = %updated.status,
            version = updated.version,
            "Transition committed"
        );
        Ok(updated)
    }

    async fn list_transitions(&self, issue_id: &Uuid) -> Result<Vec<TransitionRecord>> {
        Ok(self
            .transitions
            .get(issue_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn issue() -> Issue {
        Issue::new(
            "Test".to_string(),
            "Description".to_string(),
            "rig-1".to_string(),
            None,
        )
    }

    fn record(issue: &Issue, to: IssueStatus) -> TransitionRecord {
        TransitionRecord::new(
            issue.id,
            issue.status,
            to,
            "tester".to_string(),
            None,
            HashMap::new(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryIssueStore::new();
        let issue = issue();
        store.insert_issue(&issue).await.unwrap();

        let loaded = store.get_issue(&issue.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, issue.id);
        assert_eq!(loaded.status, IssueStatus::New);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = InMemoryIssueStore::new();
        let issue = issue();
        store.insert_issue(&issue).await.unwrap();
        assert!(store.insert_issue(&issue).await.is_err());
    }

    #[tokio::test]
    async fn test_commit_bumps_version_and_appends_record() {
        let store = InMemoryIssueStore::new();
        let issue = issue();
        store.insert_issue(&issue).await.unwrap();

        let updated = store
            .commit_transition(&issue.id, 0, record(&issue, IssueStatus::Triage))
            .await
            .unwrap();

        assert_eq!(updated.status, IssueStatus::Triage);
        assert_eq!(updated.version, 1);

        let trail = store.list_transitions(&issue.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].to_status, IssueStatus::Triage);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = InMemoryIssueStore::new();
        let issue = issue();
        store.insert_issue(&issue).await.unwrap();

        store
            .commit_transition(&issue.id, 0, record(&issue, IssueStatus::Triage))
            .await
            .unwrap();

        let stale = store
            .commit_transition(&issue.id, 0, record(&issue, IssueStatus::Rejected))
            .await;
        match stale {
            Err(CommitError::VersionConflict(current)) => {
                assert_eq!(current.status, IssueStatus::Triage);
                assert_eq!(current.version, 1);
            }
            other => panic!("expected VersionConflict, got {other:?}"),
        }

        // Exactly one committed record
        assert_eq!(store.list_transitions(&issue.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_missing_issue_not_found() {
        let store = InMemoryIssueStore::new();
        let issue = issue();
        let result = store
            .commit_transition(&issue.id, 0, record(&issue, IssueStatus::Triage))
            .await;
        assert!(matches!(result, Err(CommitError::NotFound)));
    }
}
