use super::job::{Job, JobContext, JobError};
use super::lock::Locker;
use super::recorder::{JobRun, JobRunRecorder, RunStatus};
use super::schedule::Schedule;
use crate::errors::ErrorKind;
use crate::identity::ComponentIdentity;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("job '{0}' is not registered")]
    UnknownJob(String),
    #[error("job '{0}' is already registered")]
    DuplicateJob(String),
    #[error("{0}")]
    InvalidSchedule(String),
}

/// What happened to one due tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    Failed(String),
    /// Another instance holds the lock, or it could not be checked.
    Skipped,
    Cancelled,
}

enum Coordination {
    Local,
    Distributed { locker: Arc<dyn Locker>, lease: Duration },
}

struct Core {
    name: &'static str,
    coordination: Coordination,
    recorder: Arc<dyn JobRunRecorder>,
    identity: ComponentIdentity,
    jobs: HashMap<String, Arc<Job>>,
}

/// Runs registered jobs on their schedules.
///
/// A local scheduler runs every due tick. A distributed one first claims the
/// tick through its [`Locker`] and silently skips it when another instance
/// already has it. Ticks that could not run are never caught up.
pub struct Scheduler {
    core: Core,
    bindings: Vec<(Schedule, String)>,
}

impl Scheduler {
    pub fn local(identity: ComponentIdentity, recorder: Arc<dyn JobRunRecorder>) -> Self {
        Self::with_coordination("local", Coordination::Local, identity, recorder)
    }

    pub fn distributed(
        identity: ComponentIdentity,
        recorder: Arc<dyn JobRunRecorder>,
        locker: Arc<dyn Locker>,
        lease: Duration,
    ) -> Self {
        Self::with_coordination(
            "distributed",
            Coordination::Distributed { locker, lease },
            identity,
            recorder,
        )
    }

    fn with_coordination(
        name: &'static str,
        coordination: Coordination,
        identity: ComponentIdentity,
        recorder: Arc<dyn JobRunRecorder>,
    ) -> Self {
        Self {
            core: Core {
                name,
                coordination,
                recorder,
                identity,
                jobs: HashMap::new(),
            },
            bindings: Vec::new(),
        }
    }

    pub fn register(&mut self, job: Job) -> Result<(), SchedulerError> {
        let name = job.name().to_string();
        if self.core.jobs.contains_key(&name) {
            return Err(SchedulerError::DuplicateJob(name));
        }
        self.core.jobs.insert(name, Arc::new(job));
        Ok(())
    }

    /// Binds a registered job to a schedule spec (`@minutely`, `@hourly`,
    /// `@daily`, `@every <duration>`).
    pub fn schedule(&mut self, spec: &str, job_name: &str) -> Result<(), SchedulerError> {
        if !self.core.jobs.contains_key(job_name) {
            return Err(SchedulerError::UnknownJob(job_name.to_string()));
        }
        let schedule = spec.parse::<Schedule>().map_err(SchedulerError::InvalidSchedule)?;
        self.bindings.push((schedule, job_name.to_string()));
        Ok(())
    }

    /// Runs `job_name` now, as a tick of its own.
    pub async fn run_once(&self, job_name: &str) -> Result<TickOutcome, SchedulerError> {
        self.run_tick(job_name, Utc::now()).await
    }

    /// Runs the `tick` instant of `job_name` with the same coordination as a
    /// scheduled tick.
    pub async fn run_tick(
        &self,
        job_name: &str,
        tick: DateTime<Utc>,
    ) -> Result<TickOutcome, SchedulerError> {
        let job = self
            .core
            .jobs
            .get(job_name)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownJob(job_name.to_string()))?;
        Ok(self.core.tick(&job, tick, &CancellationToken::new()).await)
    }

    /// Spawns one recurring task per binding. Cancelling `cancel` (or calling
    /// [`RecurringTasks::shutdown`]) stops them all.
    pub fn start(self, cancel: CancellationToken) -> RecurringTasks {
        let core = Arc::new(self.core);
        let handles = self
            .bindings
            .into_iter()
            .filter_map(|(schedule, job_name)| {
                let job = core.jobs.get(&job_name)?.clone();
                tracing::info!(
                    scheduler = core.name,
                    job = %job_name,
                    schedule = %schedule,
                    "job scheduled"
                );
                Some(tokio::spawn(recurring(
                    core.clone(),
                    schedule,
                    job,
                    cancel.clone(),
                )))
            })
            .collect();
        RecurringTasks { cancel, handles }
    }
}

/// Wall clock advanced by the runtime timer, so that ticks and sleeps agree
/// even on a paused test runtime.
#[derive(Clone, Copy)]
struct Clock {
    wall: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            started: tokio::time::Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

async fn recurring(core: Arc<Core>, schedule: Schedule, job: Arc<Job>, cancel: CancellationToken) {
    let clock = Clock::start();
    loop {
        let now = clock.now();
        let tick = schedule.next_after(now);
        let wait = (tick - now).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        if core.tick(&job, tick, &cancel).await == TickOutcome::Cancelled {
            break;
        }
    }
    tracing::debug!(scheduler = core.name, job = job.name(), "recurring task stopped");
}

impl Core {
    async fn tick(&self, job: &Job, tick: DateTime<Utc>, cancel: &CancellationToken) -> TickOutcome {
        let span = tracing::info_span!(
            "Job run",
            job = job.name(),
            %tick,
            scheduler = self.name,
            component_name = %self.identity.name,
            component_id = %self.identity.id,
        );
        async {
            if let Coordination::Distributed { locker, lease } = &self.coordination {
                match locker.try_lock(job.name(), tick, *lease).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::LockContention => {
                        tracing::debug!("{}, skipping tick", err);
                        return TickOutcome::Skipped;
                    }
                    Err(err) => {
                        tracing::warn!("could not check job lock, skipping tick: {}", err);
                        return TickOutcome::Skipped;
                    }
                }
            }

            let outcome = self.execute(job, tick, cancel).await;

            if let Coordination::Distributed { locker, .. } = &self.coordination {
                if let Err(err) = locker.unlock(job.name(), tick).await {
                    tracing::warn!("could not release job lock, it will expire: {}", err);
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job: &Job, tick: DateTime<Utc>, cancel: &CancellationToken) -> TickOutcome {
        let ctx = JobContext::new(job.name(), cancel.child_token());
        let started_at = Utc::now();
        let result = job.run(&ctx).await;
        let finished_at = Utc::now();

        let (status, message, outcome) = match result {
            Ok(_) => (RunStatus::Completed, None, TickOutcome::Completed),
            Err(JobError::Cancelled(_)) => (RunStatus::Cancelled, None, TickOutcome::Cancelled),
            Err(err) => {
                let message = err.to_string();
                (RunStatus::Failed, Some(message.clone()), TickOutcome::Failed(message))
            }
        };

        let run = JobRun {
            id: ctx.run_id,
            job_name: job.name().to_string(),
            component_name: self.identity.name.clone(),
            component_id: self.identity.id.clone(),
            status,
            message,
            scheduled_at: tick,
            started_at,
            finished_at,
        };
        if let Err(err) = self.recorder.record(&run).await {
            tracing::error!("{}", err);
        }
        outcome
    }
}

/// Handles of the background tasks started by [`Scheduler::start`].
pub struct RecurringTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl RecurringTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancels every task and waits for all of them to stop.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::error!("recurring task panicked: {}", err);
            }
        }
    }
}
