use super::job::{Job, Payload, StepResult};
use crate::connectors::ElasticsearchConnector;
use crate::errors::BridgeError;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub const INDEX_CLEANING_JOB: &str = "elasticsearch-cleaning";

fn date_suffix() -> &'static Regex {
    static DATE_SUFFIX: OnceLock<Regex> = OnceLock::new();
    DATE_SUFFIX.get_or_init(|| Regex::new(r"[0-9]{4}\.[0-9]{2}\.[0-9]{2}$").expect("valid regex"))
}

/// Indexes whose name ends with a `YYYY.MM.DD` day older than `cutoff`.
/// Names without a valid date suffix are never selected.
pub fn select_expired_indexes(names: &[String], cutoff: DateTime<Utc>) -> Vec<String> {
    names
        .iter()
        .filter(|name| {
            let Some(suffix) = date_suffix().find(name) else {
                return false;
            };
            match NaiveDate::parse_from_str(suffix.as_str(), "%Y.%m.%d") {
                Ok(day) => day
                    .and_hms_opt(0, 0, 0)
                    .map(|midnight| midnight.and_utc() < cutoff)
                    .unwrap_or(false),
                Err(err) => {
                    tracing::debug!("ignoring index '{}' with invalid date: {}", name, err);
                    false
                }
            }
        })
        .cloned()
        .collect()
}

fn index_names(input: Payload, context: &str) -> Result<Vec<String>, BridgeError> {
    match input {
        Payload::Names(names) => Ok(names),
        other => Err(BridgeError::misconfiguration(
            context,
            format!("unexpected step input {:?}", other),
        )),
    }
}

fn select_expired(input: Payload, expiration: Duration, now: DateTime<Utc>) -> StepResult {
    let names = index_names(input, "cannot select expired indexes")?;
    let cutoff = chrono::Duration::from_std(expiration)
        .ok()
        .and_then(|expiration| now.checked_sub_signed(expiration))
        .ok_or_else(|| {
            BridgeError::misconfiguration(
                "cannot select expired indexes",
                format!("index expiration {:?} is out of range", expiration),
            )
        })?;
    Ok(Payload::Names(select_expired_indexes(&names, cutoff)))
}

async fn delete_expired(client: &dyn ElasticsearchConnector, input: Payload) -> StepResult {
    let names = index_names(input, "cannot delete expired indexes")?;
    for name in &names {
        client
            .delete_index(name)
            .await
            .map_err(|err| BridgeError::probe(format!("cannot delete index '{}'", name), err))?;
        tracing::info!(index = %name, "deleted expired index");
    }
    Ok(Payload::Names(names))
}

/// List indexes, keep those older than `expiration`, delete them one by one.
///
/// The first failed deletion aborts the run; the remaining indexes are picked
/// up again on the next run.
pub fn index_cleaning(client: Arc<dyn ElasticsearchConnector>, expiration: Duration) -> Job {
    let lister = client.clone();
    Job::new(INDEX_CLEANING_JOB)
        .step(move |_, _| {
            let client = lister.clone();
            async move {
                let indexes = client.list_indexes().await.map_err(|err| {
                    BridgeError::probe("cannot retrieve list of indexes from elasticsearch", err)
                })?;
                Ok::<_, BridgeError>(Payload::Names(
                    indexes.into_iter().map(|index| index.index).collect(),
                ))
            }
        })
        .step(move |_, input| async move { select_expired(input, expiration, Utc::now()) })
        .step(move |_, input| {
            let client = client.clone();
            async move { delete_expired(client.as_ref(), input).await }
        })
}
