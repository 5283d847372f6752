use std::fmt;

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A monitored dependency is unreachable or answered with an error.
    ProbeFailure,
    /// The report store or the job bookkeeping could not be written.
    PersistenceFailure,
    /// The ID generator could not produce an identifier.
    IdentityFailure,
    /// Another instance holds the job lock. Not a failure for the scheduler.
    LockContention,
    /// A setting is out of range, or a job is wired inconsistently.
    Misconfiguration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProbeFailure => "probe failure",
            Self::PersistenceFailure => "persistence failure",
            Self::IdentityFailure => "identity failure",
            Self::LockContention => "lock contention",
            Self::Misconfiguration => "misconfiguration",
        };
        f.write_str(name)
    }
}

/// Error carried through the health and job layers.
///
/// `context` describes the operation that failed, `cause` keeps the low level
/// error it wraps. Rendering follows the `"<context>: <cause>"` convention so the
/// message can be stored as-is in a report.
#[derive(Debug)]
pub struct BridgeError {
    kind: ErrorKind,
    context: String,
    cause: Option<Cause>,
}

impl BridgeError {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
            cause: None,
        }
    }

    pub fn wrap<E>(kind: ErrorKind, context: impl Into<String>, cause: E) -> Self
    where
        E: Into<Cause>,
    {
        Self {
            kind,
            context: context.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn probe<E: Into<Cause>>(context: impl Into<String>, cause: E) -> Self {
        Self::wrap(ErrorKind::ProbeFailure, context, cause)
    }

    pub fn persistence<E: Into<Cause>>(context: impl Into<String>, cause: E) -> Self {
        Self::wrap(ErrorKind::PersistenceFailure, context, cause)
    }

    pub fn identity<E: Into<Cause>>(context: impl Into<String>, cause: E) -> Self {
        Self::wrap(ErrorKind::IdentityFailure, context, cause)
    }

    pub fn misconfiguration<E: Into<Cause>>(context: impl Into<String>, cause: E) -> Self {
        Self::wrap(ErrorKind::Misconfiguration, context, cause)
    }

    pub fn lock_contention(job_name: &str) -> Self {
        Self::new(
            ErrorKind::LockContention,
            format!("lock for job '{}' is held by another instance", job_name),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.context, cause),
            None => f.write_str(&self.context),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn wrapped_error_renders_context_then_cause() {
        let err = BridgeError::probe("could not ping influx", "connection refused");

        assert_eq!(err.kind(), ErrorKind::ProbeFailure);
        assert_eq!(err.to_string(), "could not ping influx: connection refused");
        assert!(err.source().is_some());
    }

    #[test]
    fn lock_contention_has_no_cause() {
        let err = BridgeError::lock_contention("elasticsearch-cleaning");

        assert_eq!(err.kind(), ErrorKind::LockContention);
        assert!(err.source().is_none());
        assert!(err.to_string().contains("elasticsearch-cleaning"));
    }
}
