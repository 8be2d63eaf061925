use crate::error::{CollectorError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.\d+)?").expect("valid version regex"));

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(\.\d+)?(ns|us|µs|ms|s|m|h))+$").expect("valid duration regex")
});

/// Logical identity of a single test, used to derive its output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIdentity {
    pub source_path: PathBuf,
    /// Configured tests root (pytest `testpaths`), e.g. `tests`.
    pub test_root: Option<String>,
    pub class_name: Option<String>,
    pub test_name: String,
}

impl TestIdentity {
    pub fn new(source_path: impl Into<PathBuf>, test_name: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            test_root: None,
            class_name: None,
            test_name: test_name.into(),
        }
    }

    pub fn with_test_root(mut self, test_root: impl Into<String>) -> Self {
        self.test_root = Some(test_root.into());
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NamespaceRole {
    Operator,
    Notebooks,
    Monitoring,
    Application,
    ModelRegistries,
    ServiceMesh,
    Serverless,
    Auth,
}

impl NamespaceRole {
    pub const ALL: [NamespaceRole; 8] = [
        NamespaceRole::Operator,
        NamespaceRole::Notebooks,
        NamespaceRole::Monitoring,
        NamespaceRole::Application,
        NamespaceRole::ModelRegistries,
        NamespaceRole::ServiceMesh,
        NamespaceRole::Serverless,
        NamespaceRole::Auth,
    ];

    /// Environment variable read by the gather entrypoint for this role.
    pub fn env_var(self) -> &'static str {
        match self {
            NamespaceRole::Operator => "OPERATOR_NAMESPACE",
            NamespaceRole::Notebooks => "NOTEBOOKS_NAMESPACE",
            NamespaceRole::Monitoring => "MONITORING_NAMESPACE",
            NamespaceRole::Application => "APPLICATIONS_NAMESPACE",
            NamespaceRole::ModelRegistries => "MODEL_REGISTRIES_NAMESPACE",
            NamespaceRole::ServiceMesh => "OSSM_NS",
            NamespaceRole::Serverless => "KNATIVE_NS",
            NamespaceRole::Auth => "AUTH_NS",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NamespaceRole::Operator => "operator",
            NamespaceRole::Notebooks => "notebooks",
            NamespaceRole::Monitoring => "monitoring",
            NamespaceRole::Application => "application",
            NamespaceRole::ModelRegistries => "model-registries",
            NamespaceRole::ServiceMesh => "service-mesh",
            NamespaceRole::Serverless => "serverless",
            NamespaceRole::Auth => "auth",
        }
    }
}

impl fmt::Display for NamespaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamespaceRole {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "operator" => Ok(NamespaceRole::Operator),
            "notebooks" => Ok(NamespaceRole::Notebooks),
            "monitoring" => Ok(NamespaceRole::Monitoring),
            "application" | "applications" => Ok(NamespaceRole::Application),
            "model-registries" | "model_registries" => Ok(NamespaceRole::ModelRegistries),
            "service-mesh" | "ossm" => Ok(NamespaceRole::ServiceMesh),
            "serverless" | "knative" => Ok(NamespaceRole::Serverless),
            "auth" => Ok(NamespaceRole::Auth),
            other => Err(CollectorError::InvalidArgument(format!(
                "unknown namespace role '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for NamespaceRole {
    type Error = CollectorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<NamespaceRole> for String {
    fn from(role: NamespaceRole) -> Self {
        role.as_str().to_string()
    }
}

/// Role -> namespace mapping, iterated in role declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceAssignment(BTreeMap<NamespaceRole, String>);

impl NamespaceAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: NamespaceRole, namespace: impl Into<String>) -> Self {
        self.0.insert(role, namespace.into());
        self
    }

    pub fn get(&self, role: NamespaceRole) -> Option<&str> {
        self.0
            .get(&role)
            .map(String::as_str)
            .filter(|ns| !ns.is_empty())
    }

    /// Populated roles only; empty values count as unset.
    pub fn iter(&self) -> impl Iterator<Item = (NamespaceRole, &str)> {
        self.0
            .iter()
            .filter(|(_, ns)| !ns.is_empty())
            .map(|(role, ns)| (*role, ns.as_str()))
    }

    /// No role assigned at all. A role mapped to an empty namespace still counts.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_populated(&self) -> bool {
        self.iter().next().is_some()
    }
}

impl FromStr for NamespaceAssignment {
    type Err = CollectorError;

    /// Parse `role=namespace,role=namespace`.
    fn from_str(s: &str) -> Result<Self> {
        let mut assignment = NamespaceAssignment::new();
        for pair in s.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (role, namespace) = pair.split_once('=').ok_or_else(|| {
                CollectorError::InvalidArgument(format!(
                    "expected role=namespace, got '{}'",
                    pair
                ))
            })?;
            assignment = assignment.with(role.parse()?, namespace.trim());
        }
        Ok(assignment)
    }
}

/// Value of the tool's `--since` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow(String);

impl TimeWindow {
    pub fn from_secs(secs: u64) -> Self {
        TimeWindow(format!("{}s", secs))
    }

    /// Window covering everything since `start`, at least one second.
    pub fn since_start(start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let elapsed = (now - start).num_seconds().max(1);
        TimeWindow::from_secs(elapsed as u64)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow("1m".to_string())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if DURATION_RE.is_match(s) {
            Ok(TimeWindow(s.to_string()))
        } else {
            Err(CollectorError::InvalidArgument(format!(
                "invalid time window '{}' (expected e.g. 90s, 5m, 1h30m)",
                s
            )))
        }
    }
}

/// Parameters of one must-gather run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionRequest {
    pub image: Option<String>,
    pub target_dir: Option<PathBuf>,
    pub since: Option<TimeWindow>,
    pub component: Option<String>,
    pub namespaces: Option<NamespaceAssignment>,
}

impl CollectionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    pub fn since(mut self, since: TimeWindow) -> Self {
        self.since = Some(since);
        self
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn namespaces(mut self, namespaces: NamespaceAssignment) -> Self {
        self.namespaces = Some(namespaces);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CollectionKind {
    /// Product must-gather image matching the installed operator version
    Rhoai,
    /// Default cluster must-gather, no image override
    Ocp,
}

/// Installed operator version, as far as image tags care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvVersion {
    pub major: u32,
    pub minor: u32,
}

impl CsvVersion {
    pub fn image_tag(&self) -> String {
        format!("rhoai-{}.{}", self.major, self.minor)
    }
}

impl FromStr for CsvVersion {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = VERSION_RE.captures(s).ok_or_else(|| {
            CollectorError::InvalidArgument(format!("no major.minor version in '{}'", s))
        })?;
        let parse = |idx: usize| {
            caps[idx].parse::<u32>().map_err(|e| {
                CollectorError::InvalidArgument(format!("bad version component in '{}': {}", s, e))
            })
        };
        Ok(CsvVersion {
            major: parse(1)?,
            minor: parse(2)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionResult {
    pub output_dir: PathBuf,
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_namespace_role_aliases() {
        assert_eq!("ossm".parse::<NamespaceRole>().unwrap(), NamespaceRole::ServiceMesh);
        assert_eq!("knative".parse::<NamespaceRole>().unwrap(), NamespaceRole::Serverless);
        assert_eq!(
            "model_registries".parse::<NamespaceRole>().unwrap(),
            NamespaceRole::ModelRegistries
        );
        assert!("dashboard".parse::<NamespaceRole>().is_err());
    }

    #[test]
    fn test_namespace_assignment_parse_orders_by_role() {
        let ns: NamespaceAssignment = "auth=authns, operator=opns".parse().unwrap();
        let roles: Vec<_> = ns.iter().map(|(role, _)| role).collect();
        assert_eq!(roles, vec![NamespaceRole::Operator, NamespaceRole::Auth]);
        assert_eq!(ns.get(NamespaceRole::Auth), Some("authns"));
    }

    #[test]
    fn test_namespace_assignment_empty_values_are_unset() {
        let ns: NamespaceAssignment = "operator=".parse().unwrap();
        assert!(!ns.is_empty());
        assert!(!ns.has_populated());
        assert_eq!(ns.get(NamespaceRole::Operator), None);
        assert!(NamespaceAssignment::new().is_empty());
    }

    #[test]
    fn test_namespace_assignment_rejects_missing_equals() {
        assert!("operator".parse::<NamespaceAssignment>().is_err());
    }

    #[test]
    fn test_namespace_assignment_from_yaml() {
        let ns: NamespaceAssignment =
            serde_yaml::from_str("operator: opns\nservice-mesh: istio-system\n").unwrap();
        assert_eq!(ns.get(NamespaceRole::Operator), Some("opns"));
        assert_eq!(ns.get(NamespaceRole::ServiceMesh), Some("istio-system"));
    }

    #[test]
    fn test_csv_version_parse() {
        assert_eq!(
            "2.5.0".parse::<CsvVersion>().unwrap(),
            CsvVersion { major: 2, minor: 5 }
        );
        assert_eq!(
            "rhods-operator.2.13.1".parse::<CsvVersion>().unwrap(),
            CsvVersion { major: 2, minor: 13 }
        );
        assert!("abc".parse::<CsvVersion>().is_err());
        assert_eq!(CsvVersion { major: 2, minor: 5 }.image_tag(), "rhoai-2.5");
    }

    #[test]
    fn test_time_window() {
        assert_eq!(TimeWindow::from_secs(60).as_str(), "60s");
        assert_eq!("1h30m".parse::<TimeWindow>().unwrap().as_str(), "1h30m");
        assert!("yesterday".parse::<TimeWindow>().is_err());
        assert!("60".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn test_time_window_since_start() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 1, 12, 2, 5).unwrap();
        assert_eq!(TimeWindow::since_start(start, later).as_str(), "125s");
        assert_eq!(TimeWindow::since_start(start, start).as_str(), "1s");
    }
}
