pub mod cleaning;
pub mod health;
pub mod job;
pub mod lock;
pub mod recorder;
pub mod schedule;
pub mod scheduler;

pub use cleaning::{index_cleaning, select_expired_indexes, INDEX_CLEANING_JOB};
pub use health::{clean_store, exec_and_persist, CLEAN_JOB};
pub use job::{Job, JobContext, JobError, Payload};
pub use lock::{Locker, NoopLocker, PgLocker};
pub use recorder::{JobRun, JobRunRecorder, LogJobRunRecorder, PgJobRunRecorder, RunStatus};
pub use schedule::Schedule;
pub use scheduler::{RecurringTasks, Scheduler, SchedulerError, TickOutcome};
