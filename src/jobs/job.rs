use crate::errors::BridgeError;
use crate::health::models::Report;
use futures::future::BoxFuture;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Value handed from one step to the next.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Reports(Vec<Report>),
    Names(Vec<String>),
    Count(u64),
}

/// Per-run context shared by every step of one invocation.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_name: String,
    pub run_id: uuid::Uuid,
    pub cancel: CancellationToken,
}

impl JobContext {
    pub fn new(job_name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            job_name: job_name.into(),
            run_id: uuid::Uuid::new_v4(),
            cancel,
        }
    }
}

pub type StepResult = Result<Payload, BridgeError>;
type Step = Box<dyn Fn(JobContext, Payload) -> BoxFuture<'static, StepResult> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job '{job}' failed at step {step}: {source}")]
    Step {
        job: String,
        step: usize,
        #[source]
        source: BridgeError,
    },
    #[error("job '{0}' was cancelled")]
    Cancelled(String),
}

/// Named, ordered chain of steps. The first step receives [`Payload::Empty`],
/// every later one the output of its predecessor. The first error aborts the
/// run; nothing is rolled back.
pub struct Job {
    name: String,
    steps: Vec<Step>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step<F, Fut>(mut self, step: F) -> Self
    where
        F: Fn(JobContext, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.steps
            .push(Box::new(move |ctx, input| Box::pin(step(ctx, input))));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order. Cancellation is checked before each step and
    /// interrupts the step in flight, so a cancelled run never reaches the
    /// steps after it.
    pub async fn run(&self, ctx: &JobContext) -> Result<Payload, JobError> {
        let mut payload = Payload::Empty;
        for (index, step) in self.steps.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                return Err(JobError::Cancelled(self.name.clone()));
            }
            let outcome = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(JobError::Cancelled(self.name.clone())),
                outcome = step(ctx.clone(), payload) => outcome,
            };
            payload = outcome.map_err(|source| JobError::Step {
                job: self.name.clone(),
                step: index + 1,
                source,
            })?;
        }
        Ok(payload)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("steps", &self.steps.len())
            .finish()
    }
}
