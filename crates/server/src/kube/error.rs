use std::path::PathBuf;

/// Errors talking to the Kubernetes API or loading credentials for it.
#[derive(Debug, thiserror::Error)]
pub enum KubeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid kubeconfig {path}: {source}")]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no kubeconfig found and not running inside a cluster")]
    NoConfiguration,

    #[error("kubeconfig has no current-context and none was given")]
    NoCurrentContext,

    #[error("context '{0}' not found in kubeconfig")]
    ContextNotFound(String),

    #[error("cluster '{0}' not found in kubeconfig")]
    ClusterNotFound(String),

    #[error("user '{0}' not found in kubeconfig")]
    UserNotFound(String),

    #[error("invalid API server URL '{server}': {source}")]
    InvalidServer {
        server: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid base64 in {field}: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("kubeconfig sets {0} without its certificate/key counterpart")]
    IncompleteClientCertificate(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl KubeError {
    /// Errors that retrying cannot fix: bad credentials or missing RBAC.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KubeError::Api { status: 401 | 403, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api { status: 404, .. })
    }
}
