//! Saga Orchestrator
//!
//! Executes steps strictly in order, feeding each step's output into the next.
//! When a step fails, every earlier step that succeeded and has a compensation
//! is compensated, in reverse order, exactly once.
//!
//! Compensations run on a fresh token that is not a child of the caller's, so
//! they still run after the caller cancelled or a step hit its deadline. Each
//! one is bounded by `compensation_timeout` instead.

use super::step::SagaStep;
use super::types::*;
use crate::config::SagaConfig;
use crate::error::{Error, Result};
use crate::guard::spawn_guarded;

use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_COMPENSATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Returned when a saga does not complete. `execution` is the full record.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct SagaFailure {
    pub execution: SagaExecution,
    #[source]
    pub error: Error,
}

pub struct Saga {
    name: String,
    steps: Vec<SagaStep>,
    compensation_timeout: Duration,
}

impl Saga {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            compensation_timeout: DEFAULT_COMPENSATION_TIMEOUT,
        }
    }

    pub fn from_config(name: impl Into<String>, config: &SagaConfig) -> Self {
        Self::new(name).with_compensation_timeout(config.compensation_timeout())
    }

    pub fn with_compensation_timeout(mut self, timeout: Duration) -> Self {
        self.compensation_timeout = timeout;
        self
    }

    /// Appends a step. Must be called before `execute`.
    pub fn add_step(&mut self, step: SagaStep) -> &mut Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }

    pub async fn execute(
        &self,
        ctx: &CancellationToken,
        input: Value,
    ) -> std::result::Result<SagaExecution, SagaFailure> {
        let mut execution = SagaExecution::new(&self.name, input.clone());
        tracing::info!(
            "Saga {} ({}) started with {} steps",
            self.name,
            execution.id,
            self.steps.len()
        );

        let mut current = input;
        for (index, step) in self.steps.iter().enumerate() {
            let started_at = Utc::now();
            let outcome = if ctx.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                self.run_step(ctx, step, current.clone()).await
            };

            match outcome {
                Ok(output) => {
                    tracing::debug!("Saga {} step {} completed", self.name, step.name);
                    execution.steps.push(StepResult {
                        name: step.name.clone(),
                        status: StepStatus::Completed,
                        output: Some(output.clone()),
                        error: None,
                        started_at,
                        completed_at: Utc::now(),
                    });
                    current = output;
                }
                Err(error) => {
                    tracing::warn!("Saga {} step {} failed: {}", self.name, step.name, error);
                    execution.steps.push(StepResult {
                        name: step.name.clone(),
                        status: StepStatus::Failed,
                        output: None,
                        error: Some(error.to_string()),
                        started_at,
                        completed_at: Utc::now(),
                    });
                    let error = self.compensate(&mut execution, index, error).await;
                    execution.error = Some(error.to_string());
                    execution.completed_at = Some(Utc::now());
                    return Err(SagaFailure { execution, error });
                }
            }
        }

        execution.status = SagaStatus::Completed;
        execution.output = Some(current);
        execution.completed_at = Some(Utc::now());
        tracing::info!("Saga {} ({}) completed", self.name, execution.id);
        Ok(execution)
    }

    async fn run_step(&self, ctx: &CancellationToken, step: &SagaStep, input: Value) -> Result<Value> {
        let token = ctx.child_token();
        let unit = format!("step {}", step.name);

        let action = step.action.clone();
        let name = step.name.clone();
        let step_token = token.clone();
        let guarded = spawn_guarded(&unit, async move {
            action(step_token, input)
                .await
                .map_err(|source| Error::StepFailed { step: name, source })
        });

        let bounded = async {
            match step.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, guarded).await {
                    Ok(result) => result,
                    Err(_) => {
                        token.cancel();
                        Err(Error::DeadlineExceeded {
                            unit: unit.clone(),
                            timeout,
                        })
                    }
                },
                None => guarded.await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Cancelled),
            result = bounded => result,
        }
    }

    /// Compensates steps `failed_index - 1 ..= 0` and returns the error to surface.
    async fn compensate(&self, execution: &mut SagaExecution, failed_index: usize, original: Error) -> Error {
        execution.status = SagaStatus::Compensating;
        let mut first_failure: Option<(String, anyhow::Error)> = None;

        for index in (0..failed_index).rev() {
            let step = &self.steps[index];
            let Some(compensate) = step.compensate.clone() else {
                continue;
            };
            let output = execution.steps[index].output.clone().unwrap_or(Value::Null);
            let unit = format!("compensation {}", step.name);

            let started_at = Utc::now();
            let token = CancellationToken::new();
            let comp_token = token.clone();
            let guarded = spawn_guarded(&unit, async move {
                Ok::<_, Error>(compensate(comp_token, output).await)
            });

            let outcome: anyhow::Result<()> =
                match tokio::time::timeout(self.compensation_timeout, guarded).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(panicked)) => Err(panicked.into()),
                    Err(_) => {
                        token.cancel();
                        Err(anyhow::anyhow!(
                            "timed out after {:?}",
                            self.compensation_timeout
                        ))
                    }
                };

            let error = outcome.as_ref().err().map(|e| e.to_string());
            execution.compensations.push(CompensationResult {
                step: step.name.clone(),
                error,
                started_at,
                completed_at: Utc::now(),
            });

            match outcome {
                Ok(()) => tracing::debug!("Saga {} compensated step {}", self.name, step.name),
                Err(e) => {
                    tracing::error!("Saga {} compensation of {} failed: {}", self.name, step.name, e);
                    if first_failure.is_none() {
                        first_failure = Some((step.name.clone(), e));
                    }
                }
            }
        }

        match first_failure {
            None => {
                execution.status = SagaStatus::Compensated;
                tracing::info!("Saga {} ({}) compensated", self.name, execution.id);
                original
            }
            Some((compensation_step, compensation)) => {
                execution.status = SagaStatus::Failed;
                Error::CompensationFailed {
                    source: Box::new(original),
                    compensation_step,
                    compensation,
                }
            }
        }
    }
}
