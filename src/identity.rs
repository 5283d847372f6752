use serde::Serialize;

/// Identity of this running instance.
///
/// Built once at startup and shared read-only with everything that needs to
/// tag its output (logs, stored reports, job locks, the version route).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentIdentity {
    pub name: String,
    pub id: String,
    pub version: String,
    pub environment: String,
    #[serde(rename = "commit")]
    pub git_commit: String,
}

impl ComponentIdentity {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        environment: impl Into<String>,
        git_commit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: environment.into(),
            git_commit: git_commit.into(),
        }
    }
}
