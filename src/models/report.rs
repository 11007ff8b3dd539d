use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Issue report as published on the ingest topic by test rigs and upstream
/// services. Unknown fields are carried into the issue's attribute map.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IssueReport {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[validate(length(min = 1, max = 255))]
    pub reporter: String,

    /// Vehicle identification number, when applicable
    pub vin: Option<String>,

    #[serde(flatten)]
    pub attributes: HashMap<String, serde_json::Value>,
}
