//! Ingest wiring: handlers registered on the reliable subscriber.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::broker::{EventEnvelope, EventHandler};
use crate::models::{Issue, IssueReport, IssueStatus};
use crate::workflow::WorkflowService;

/// Consumes issue reports from the ingest topic and opens issues through the
/// workflow service. Delivery is at-least-once; a redelivered report opens a
/// second issue (no application-level idempotency by design).
pub struct IssueReportHandler {
    workflow: Arc<WorkflowService>,
}

impl IssueReportHandler {
    pub fn new(workflow: Arc<WorkflowService>) -> Self {
        Self { workflow }
    }
}

#[async_trait]
impl EventHandler for IssueReportHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        let report: IssueReport = serde_json::from_value(envelope.value.clone())?;
        report.validate()?;

        let mut issue = Issue::new(
            report.title,
            report.description,
            report.reporter,
            report.vin,
        );
        issue.attributes = report.attributes;

        let issue = self.workflow.create_issue(issue).await?;
        tracing::info!(
            issue_id = %issue.id,
            topic = %envelope.topic,
            offset = envelope.offset,
            "Issue opened from report"
        );
        Ok(())
    }
}

/// Transition command as published on the transition topic by automated
/// pipelines (test-rig teardown, regression sweeps).
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionCommand {
    pub issue_id: Uuid,
    pub to_status: IssueStatus,
    pub actor: String,
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Executes transition commands through the workflow service. An invalid
/// transition fails the handler; after the retry budget the command lands in
/// the dead-letter topic with the rule violation as its error.
pub struct TransitionCommandHandler {
    workflow: Arc<WorkflowService>,
}

impl TransitionCommandHandler {
    pub fn new(workflow: Arc<WorkflowService>) -> Self {
        Self { workflow }
    }
}

#[async_trait]
impl EventHandler for TransitionCommandHandler {
    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        let command: TransitionCommand = serde_json::from_value(envelope.value.clone())?;

        let issue = self
            .workflow
            .execute_transition(
                &command.issue_id,
                command.to_status,
                &command.actor,
                command.reason,
                command.metadata,
            )
            .await?;

        tracing::info!(
            issue_id = %issue.id,
            status = %issue.status,
            topic = %envelope.topic,
            offset = envelope.offset,
            "Transition applied from command"
        );
        Ok(())
    }
}
