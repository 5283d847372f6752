pub mod health;

pub use health::{all_statuses, exec, read, version};
