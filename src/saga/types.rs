use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SagaStatus {
    /// Steps are still executing forward.
    Running,
    /// Every step succeeded.
    Completed,
    /// A step failed; compensations are running.
    Compensating,
    /// A step failed and every compensation succeeded.
    Compensated,
    /// A step failed and at least one compensation failed too.
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Failed,
}

/// Outcome of one forward step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of one compensation, in invocation order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompensationResult {
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl CompensationResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Record of a single `Saga::execute` call.
///
/// `steps` and `compensations` are append-only while the saga runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SagaExecution {
    pub id: Uuid,
    pub saga_name: String,
    pub status: SagaStatus,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps: Vec<StepResult>,
    pub compensations: Vec<CompensationResult>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SagaExecution {
    pub fn new(saga_name: &str, input: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            saga_name: saga_name.to_string(),
            status: SagaStatus::Running,
            input,
            output: None,
            error: None,
            steps: Vec::new(),
            compensations: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Names of the compensated steps, in invocation order.
    pub fn compensated_steps(&self) -> Vec<&str> {
        self.compensations.iter().map(|c| c.step.as_str()).collect()
    }
}
