pub mod configuration;
pub mod connectors;
pub mod db;
pub mod errors;
pub mod health;
pub mod helpers;
pub mod identity;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod startup;
pub mod telemetry;
