use crate::error::{CollectorError, Result};
use crate::types::CsvVersion;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::{Api, Client, ResourceExt, config};
use std::future::Future;
use tracing::{debug, info};

pub const DEFAULT_OPERATOR_NAMESPACE: &str = "redhat-ods-operator";
pub const DEFAULT_CSV_NAME_PREFIX: &str = "rhods-operator";

/// Provides the installed product version used to pick the must-gather image.
pub trait VersionSource {
    fn installed_version(&self) -> impl Future<Output = Result<CsvVersion>> + Send;
}

/// Fixed version, e.g. from the command line.
#[derive(Debug, Clone, Copy)]
pub struct StaticVersion(pub CsvVersion);

impl VersionSource for StaticVersion {
    async fn installed_version(&self) -> Result<CsvVersion> {
        Ok(self.0)
    }
}

impl<V: VersionSource + Sync> VersionSource for Option<V> {
    async fn installed_version(&self) -> Result<CsvVersion> {
        match self {
            Some(source) => source.installed_version().await,
            None => Err(CollectorError::NotFound(
                "installed product version is not available".into(),
            )),
        }
    }
}

fn csv_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        "operators.coreos.com",
        "v1alpha1",
        "ClusterServiceVersion",
    ))
}

/// Build a client for the given kubeconfig context, or the current one.
pub async fn client_for_context(context: Option<&str>) -> Result<Client> {
    let config = match context {
        Some(ctx) => config::Config::from_kubeconfig(&config::KubeConfigOptions {
            context: Some(ctx.to_string()),
            ..Default::default()
        })
        .await
        .map_err(|e| {
            CollectorError::Configuration(format!(
                "Context '{}' not found in kubeconfig: {}",
                ctx, e
            ))
        })?,
        None => config::Config::infer()
            .await
            .map_err(|e| CollectorError::Configuration(format!("No usable kubeconfig: {}", e)))?,
    };
    let client = Client::try_from(config)?;
    info!(
        "Initialized client for context: {}",
        context.unwrap_or("<current>")
    );
    Ok(client)
}

fn csv_phase(csv: &DynamicObject) -> Option<&str> {
    csv.data
        .get("status")
        .and_then(|s| s.get("phase"))
        .and_then(|p| p.as_str())
}

/// Version of the CSV whose name starts with `prefix`, preferring a `Succeeded` one.
pub fn select_csv_version(csvs: &[DynamicObject], prefix: &str) -> Result<CsvVersion> {
    let matching: Vec<&DynamicObject> = csvs
        .iter()
        .filter(|csv| csv.name_any().starts_with(prefix))
        .collect();

    let csv = matching
        .iter()
        .find(|csv| csv_phase(csv) == Some("Succeeded"))
        .or_else(|| matching.first())
        .ok_or_else(|| {
            CollectorError::NotFound(format!("No ClusterServiceVersion named {}*", prefix))
        })?;

    let name = csv.name_any();
    let version = csv
        .data
        .get("spec")
        .and_then(|s| s.get("version"))
        .and_then(|v| v.as_str())
        .unwrap_or(name.as_str());
    debug!("Using CSV {} (version {})", name, version);
    version.parse()
}

/// Reads the installed operator CSV from the cluster.
#[derive(Clone)]
pub struct KubeCsvSource {
    client: Client,
    namespace: String,
    name_prefix: String,
}

impl KubeCsvSource {
    pub fn new(client: Client, namespace: impl Into<String>, name_prefix: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            name_prefix: name_prefix.into(),
        }
    }
}

impl VersionSource for KubeCsvSource {
    async fn installed_version(&self) -> Result<CsvVersion> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &self.namespace, &csv_resource());
        let list = api.list(&ListParams::default()).await?;
        select_csv_version(&list.items, &self.name_prefix)
    }
}
