//! Thin clients for the monitored dependencies.
//!
//! Each dependency sits behind a small trait (`ElasticsearchConnector`,
//! `Pinger`, `IdGenerator`, `ErrorTracker`) so that health modules, jobs and
//! the correlation middleware can be exercised against the in-memory doubles
//! in [`mock`] instead of real services.

pub mod cache;
pub mod elasticsearch;
pub mod errors;
pub mod flaki;
pub mod ping;
pub mod sentry;

#[cfg(test)]
pub mod mock;

pub use cache::RedisPinger;
pub use elasticsearch::{ClusterHealth, ElasticsearchClient, ElasticsearchConnector, IndexSummary};
pub use errors::ConnectorError;
pub use flaki::{FlakiClient, IdGenerator};
pub use ping::{HttpPinger, Pinger};
pub use sentry::{ErrorTracker, SentryClient};
