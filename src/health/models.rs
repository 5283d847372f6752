use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "KO")]
    Ko,
    Degraded,
    Deactivated,
    /// Upstream state that does not map to any of the above. Only probes emit it.
    Unknown,
}

impl Status {
    /// Rank used by [`aggregate`]. `Unknown` ranks with `Ok` so that it can
    /// never be the outcome of an aggregation.
    fn severity(self) -> u8 {
        match self {
            Self::Ok | Self::Unknown => 0,
            Self::Degraded => 1,
            Self::Ko => 2,
            Self::Deactivated => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Ko => "KO",
            Self::Degraded => "Degraded",
            Self::Deactivated => "Deactivated",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global status of one dependency: the most severe status found in its reports,
/// `Deactivated > KO > Degraded > OK`, whatever their order.
pub fn aggregate(reports: &[Report]) -> Status {
    reports
        .iter()
        .map(|report| report.status)
        .fold(Status::Ok, |worst, status| {
            if status.severity() > worst.severity() {
                status
            } else {
                worst
            }
        })
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub name: String,
    #[serde(with = "super::duration")]
    pub duration: Duration,
    pub status: Status,
    #[serde(
        default,
        serialize_with = "serialize_error",
        deserialize_with = "deserialize_error"
    )]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infos: Option<serde_json::Value>,
}

impl Report {
    pub fn new(name: impl Into<String>, duration: Duration, status: Status) -> Self {
        Self {
            name: name.into(),
            duration,
            status,
            error: None,
            infos: None,
        }
    }

    pub fn ok(name: impl Into<String>, duration: Duration) -> Self {
        Self::new(name, duration, Status::Ok)
    }

    pub fn ko(name: impl Into<String>, duration: Duration, error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(name, duration, Status::Ko)
        }
    }

    /// Report of a probe that was skipped because the dependency is switched off.
    pub fn deactivated(name: impl Into<String>) -> Self {
        Self::new(name, Duration::ZERO, Status::Deactivated)
    }

    pub fn with_infos(mut self, infos: serde_json::Value) -> Self {
        self.infos = Some(infos);
        self
    }
}

fn serialize_error<S>(error: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(error.as_deref().unwrap_or_default())
}

fn deserialize_error<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|message| !message.is_empty()))
}

/// Last report set persisted for one `(component_name, healthcheck_unit)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredReport {
    pub component_id: String,
    pub component_name: String,
    pub healthcheck_unit: String,
    pub reports: serde_json::Value,
    pub last_updated: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl StoredReport {
    /// A stale row is still returned by reads until the clean job removes it.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.valid_until < now
    }

    pub fn parsed_reports(&self) -> Result<Vec<Report>, serde_json::Error> {
        serde_json::from_value(self.reports.clone())
    }

    pub fn status(&self) -> Status {
        match self.parsed_reports() {
            Ok(reports) => aggregate(&reports),
            Err(_) => Status::Unknown,
        }
    }
}
