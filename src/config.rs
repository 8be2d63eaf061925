use crate::error::{CollectorError, Result};
use crate::kubernetes::{DEFAULT_CSV_NAME_PREFIX, DEFAULT_OPERATOR_NAMESPACE};
use crate::paths::prepare_item_directory;
use crate::types::{NamespaceAssignment, TestIdentity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_IMAGE_REPOSITORY: &str = "quay.io/repository/modh/must-gather";

const CONFIG_CANDIDATES: [&str; 2] = ["must-gather.yaml", "must-gather.yml"];

/// Settings shared by all collections in a test session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Root under which per-test collector directories are created
    pub must_gather_base_dir: Option<PathBuf>,

    /// Tests root as configured for the test runner (e.g. `tests`)
    pub test_root: Option<String>,

    #[serde(default = "default_image_repository")]
    pub image_repository: String,

    #[serde(default = "default_operator_namespace")]
    pub operator_namespace: String,

    #[serde(default = "default_csv_name_prefix")]
    pub csv_name_prefix: String,

    /// Default namespace assignment for ad-hoc gathers
    #[serde(default)]
    pub namespaces: Option<NamespaceAssignment>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            must_gather_base_dir: None,
            test_root: None,
            image_repository: default_image_repository(),
            operator_namespace: default_operator_namespace(),
            csv_name_prefix: default_csv_name_prefix(),
            namespaces: None,
        }
    }
}

fn default_image_repository() -> String {
    DEFAULT_IMAGE_REPOSITORY.to_string()
}

fn default_operator_namespace() -> String {
    DEFAULT_OPERATOR_NAMESPACE.to_string()
}

fn default_csv_name_prefix() -> String {
    DEFAULT_CSV_NAME_PREFIX.to_string()
}

impl Config {
    /// Load from `path`, or the first candidate file in the current directory.
    ///
    /// Falls back to defaults when no file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }
        for candidate in CONFIG_CANDIDATES {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }
        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Values given on the command line or in the environment win.
    pub fn with_overrides(mut self, base_dir: Option<PathBuf>, test_root: Option<String>) -> Self {
        if base_dir.is_some() {
            self.must_gather_base_dir = base_dir;
        }
        if test_root.is_some() {
            self.test_root = test_root;
        }
        self
    }

    pub fn context(&self) -> Result<MustGatherContext> {
        let base = self.must_gather_base_dir.clone().ok_or_else(|| {
            CollectorError::Configuration("must-gather base directory is not configured".into())
        })?;
        Ok(MustGatherContext::new(base, self.test_root.clone()))
    }
}

/// Collector state for one test session, passed explicitly to callers.
#[derive(Debug, Clone)]
pub struct MustGatherContext {
    base_directory: PathBuf,
    test_root: Option<String>,
    collector_directory: Option<PathBuf>,
}

impl MustGatherContext {
    pub fn new(base_directory: impl Into<PathBuf>, test_root: Option<String>) -> Self {
        Self {
            base_directory: base_directory.into(),
            test_root,
            collector_directory: None,
        }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Current collector directory, or the base directory if none was set.
    pub fn collector_dir(&self) -> &Path {
        self.collector_directory
            .as_deref()
            .unwrap_or(&self.base_directory)
    }

    /// Point the collector at the directory derived for `identity`.
    pub fn set_collector_directory(&mut self, identity: &TestIdentity) -> Result<&Path> {
        let mut identity = identity.clone();
        if identity.test_root.is_none() {
            identity.test_root = self.test_root.clone();
        }
        let dir = prepare_item_directory(&identity, &self.base_directory)?;
        let dir = self.collector_directory.insert(dir);
        Ok(dir.as_path())
    }
}
