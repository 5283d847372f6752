pub mod elasticsearch;
pub mod flaki;
pub mod ping;
pub mod sentry;

pub use elasticsearch::ElasticsearchModule;
pub use flaki::FlakiModule;
pub use ping::PingModule;
pub use sentry::SentryModule;
