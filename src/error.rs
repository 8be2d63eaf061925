use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Invalid arguments: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to run '{command}': {source}")]
    Process {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CollectorError>;
