//! Workflow service: validated, serialized transition execution.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Issue, IssueStatus, TransitionRecord};

use super::machine::{allowed_transitions, validate_transition};
use super::store::{CommitError, IssueStore};

/// Executes lifecycle transitions against the issue store.
///
/// Concurrent callers racing on the same issue are serialized through a
/// version compare-and-set: the commit only succeeds if the issue still holds
/// the version observed at load time, so two racers can never both commit
/// from the same stale status.
pub struct WorkflowService {
    store: Arc<dyn IssueStore>,
}

impl WorkflowService {
    pub fn new(store: Arc<dyn IssueStore>) -> Self {
        Self { store }
    }

    /// Targets legal from a given status; consumed by the REST layer
    pub fn valid_transitions(&self, from: IssueStatus) -> Vec<IssueStatus> {
        allowed_transitions(from).to_vec()
    }

    /// Create a new issue in the initial status
    pub async fn create_issue(&self, issue: Issue) -> Result<Issue> {
        self.store.insert_issue(&issue).await?;
        tracing::info!(issue_id = %issue.id, title = %issue.title, "Issue created");
        Ok(issue)
    }

    /// Fetch an issue, failing NotFound if absent
    pub async fn get_issue(&self, issue_id: &Uuid) -> Result<Issue> {
        self.store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", issue_id)))
    }

    /// Audit trail for an issue, oldest first
    pub async fn transition_history(&self, issue_id: &Uuid) -> Result<Vec<TransitionRecord>> {
        // Surface NotFound rather than an empty trail for unknown issues
        self.get_issue(issue_id).await?;
        self.store.list_transitions(issue_id).await
    }

    /// Validate and commit one lifecycle transition.
    ///
    /// Loads the entity, validates against its currently persisted status,
    /// and commits status + audit record atomically under a version CAS. A
    /// CAS conflict means a concurrent caller won the race; the loser fails
    /// with `InvalidTransition` built from the now-current state.
    pub async fn execute_transition(
        &self,
        issue_id: &Uuid,
        to: IssueStatus,
        actor: &str,
        reason: Option<String>,
        metadata: HashMap<String, String>,
    ) -> Result<Issue> {
        let issue = self.get_issue(issue_id).await?;

        validate_transition(issue.status, to)?;

        let record = TransitionRecord::new(
            issue.id,
            issue.status,
            to,
            actor.to_string(),
            reason,
            metadata,
        );

        match self
            .store
            .commit_transition(issue_id, issue.version, record)
            .await
        {
            Ok(updated) => {
                tracing::info!(
                    issue_id = %issue_id,
                    from = %issue.status,
                    to = %to,
                    actor,
                    "Transition committed"
                );
                Ok(updated)
            }
            Err(CommitError::NotFound) => {
                Err(AppError::NotFound(format!("Issue {} not found", issue_id)))
            }
            Err(CommitError::VersionConflict(current)) => {
                tracing::warn!(
                    issue_id = %issue_id,
                    attempted_from = %issue.status,
                    attempted_to = %to,
                    current_status = %current.status,
                    "Transition lost concurrent race"
                );
                Err(AppError::InvalidTransition {
                    from: current.status,
                    to,
                    allowed: allowed_transitions(current.status).to_vec(),
                })
            }
            Err(CommitError::Storage(msg)) => Err(AppError::Storage(msg)),
        }
    }
}
