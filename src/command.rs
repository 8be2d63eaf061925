use crate::error::{CollectorError, Result};
use crate::types::{CollectionRequest, NamespaceAssignment, NamespaceRole};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

pub const MUST_GATHER_PREFIX: [&str; 3] = ["oc", "adm", "must-gather"];

/// Entrypoint inside the must-gather image.
pub const GATHER_ENTRYPOINT: &str = "/usr/bin/gather";

static NAMESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").expect("valid namespace regex")
});

static COMPONENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid component regex"));

fn validate(request: &CollectionRequest) -> Result<()> {
    // any assigned role counts, even one mapped to an empty namespace
    let namespaces = request.namespaces.as_ref().filter(|ns| !ns.is_empty());
    let component = request.component.as_deref().filter(|c| !c.is_empty());

    if component.is_some() && namespaces.is_some() {
        return Err(CollectorError::InvalidArgument(
            "component name and namespaces can't be passed together".into(),
        ));
    }
    if let Some(component) = component
        && !COMPONENT_RE.is_match(component)
    {
        return Err(CollectorError::InvalidArgument(format!(
            "invalid component name '{}'",
            component
        )));
    }
    if let Some(namespaces) = namespaces {
        for (role, namespace) in namespaces.iter() {
            if !NAMESPACE_RE.is_match(namespace) {
                return Err(CollectorError::InvalidArgument(format!(
                    "invalid {} namespace '{}'",
                    role, namespace
                )));
            }
        }
    }
    Ok(())
}

/// `export VAR=ns;` for every populated role, then the gather entrypoint.
pub fn namespace_exports(namespaces: &NamespaceAssignment) -> String {
    let exports: String = NamespaceRole::ALL
        .iter()
        .filter_map(|role| {
            namespaces
                .get(*role)
                .map(|namespace| format!("export {}={};", role.env_var(), namespace))
        })
        .collect();
    format!("{} {}", exports, GATHER_ENTRYPOINT)
}

/// Token list for `oc adm must-gather` described by `request`.
pub fn build_command(request: &CollectionRequest) -> Result<Vec<String>> {
    validate(request)?;

    let mut command: Vec<String> = MUST_GATHER_PREFIX.iter().map(|s| s.to_string()).collect();

    if let Some(dir) = &request.target_dir {
        command.push(format!("--dest-dir={}", dir.display()));
    }
    if let Some(since) = &request.since {
        command.push(format!("--since={}", since));
    }

    let component = request.component.as_deref().filter(|c| !c.is_empty());
    let namespaces = request.namespaces.as_ref().filter(|ns| ns.has_populated());

    match request.image.as_deref().filter(|i| !i.is_empty()) {
        Some(image) => {
            command.push(format!("--image={}", image));
            if let Some(component) = component {
                command.push("--".to_string());
                command.push(format!("export COMPONENT={}; {}", component, GATHER_ENTRYPOINT));
            } else if let Some(namespaces) = namespaces {
                command.push("--".to_string());
                command.push(namespace_exports(namespaces));
            }
        }
        None if component.is_some() || namespaces.is_some() => {
            debug!("No image given; component/namespace settings are ignored");
        }
        None => {}
    }

    Ok(command)
}

/// Human readable form of a token list, for logs and dry runs.
pub fn render_command(command: &[String]) -> String {
    command
        .iter()
        .map(|token| {
            if token.is_empty()
                || token
                    .chars()
                    .any(|c| c.is_whitespace() || ";'\"$`\\|&<>()*?[]{}~!#".contains(c))
            {
                format!("'{}'", token.replace('\'', "'\\''"))
            } else {
                token.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
