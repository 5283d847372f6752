pub mod health_report;
pub mod job_lock;
pub mod job_run;
