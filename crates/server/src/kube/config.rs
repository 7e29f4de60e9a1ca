//! Cluster credentials from kubeconfig files or the in-cluster service account.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use eventexporter_core::KubeSettings;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::error::KubeError;

/// Mount point of the pod's service account credentials.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

// ── Resolved configuration ──────────────────────────────────────────

/// Where the bearer token comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Static(String),
    /// Re-read on every request; projected service account tokens rotate.
    File(PathBuf),
}

impl TokenSource {
    pub fn token(&self) -> Result<String, KubeError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::File(path) => fs::read_to_string(path)
                .map(|token| token.trim().to_string())
                .map_err(|source| KubeError::Io {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

/// Everything needed to build an API client.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub server: Url,
    /// Extra PEM-encoded CA certificates to trust.
    pub root_certificates: Vec<Vec<u8>>,
    /// PEM client certificate chain followed by its private key.
    pub identity_pem: Option<Vec<u8>>,
    pub accept_invalid_certs: bool,
    pub token: Option<TokenSource>,
}

impl ClusterConfig {
    /// A plain configuration for `server` with no credentials.
    pub fn for_server(server: Url) -> Self {
        Self {
            server,
            root_certificates: Vec::new(),
            identity_pem: None,
            accept_invalid_certs: false,
            token: None,
        }
    }

    /// Resolve credentials: explicit kubeconfig, `$KUBECONFIG`,
    /// `~/.kube/config`, then the in-cluster service account.
    pub fn load(settings: &KubeSettings) -> Result<Self, KubeError> {
        let context = settings.context.as_deref();

        if let Some(explicit) = settings.kubeconfig.as_deref() {
            return match first_existing(explicit.as_os_str()) {
                Some(path) => Self::from_kubeconfig(&path, context),
                None => Err(KubeError::Io {
                    path: explicit.to_path_buf(),
                    source: std::io::ErrorKind::NotFound.into(),
                }),
            };
        }

        if let Some(path) = std::env::var_os("KUBECONFIG")
            .filter(|paths| !paths.is_empty())
            .and_then(|paths| first_existing(&paths))
        {
            return Self::from_kubeconfig(&path, context);
        }

        if let Some(path) = dirs::home_dir()
            .map(|home| home.join(".kube").join("config"))
            .filter(|path| path.is_file())
        {
            return Self::from_kubeconfig(&path, context);
        }

        Self::in_cluster()
    }

    /// Load `path`, using `context` or the file's `current-context`.
    pub fn from_kubeconfig(path: &Path, context: Option<&str>) -> Result<Self, KubeError> {
        let raw = fs::read_to_string(path).map_err(|source| KubeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let kubeconfig: Kubeconfig = serde_yaml::from_str(&raw).map_err(|source| KubeError::Kubeconfig {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let config = kubeconfig.resolve(context, base_dir)?;
        info!(path = %path.display(), server = %config.server, "using kubeconfig");
        Ok(config)
    }

    /// Service account credentials of the pod we run in.
    pub fn in_cluster() -> Result<Self, KubeError> {
        Self::in_cluster_from(
            std::env::var("KUBERNETES_SERVICE_HOST").ok(),
            std::env::var("KUBERNETES_SERVICE_PORT").ok(),
            Path::new(SERVICE_ACCOUNT_DIR),
        )
    }

    fn in_cluster_from(
        host: Option<String>,
        port: Option<String>,
        account_dir: &Path,
    ) -> Result<Self, KubeError> {
        let (Some(host), Some(port)) = (host, port) else {
            return Err(KubeError::NoConfiguration);
        };
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host
        };
        let server = format!("https://{host}:{port}");
        let mut config = Self::for_server(parse_server(&server)?);

        let ca_path = account_dir.join("ca.crt");
        config.root_certificates.push(read_file(&ca_path)?);
        config.token = Some(TokenSource::File(account_dir.join("token")));

        info!(server = %config.server, "using in-cluster service account");
        Ok(config)
    }
}

/// First path in a `KUBECONFIG`-style list that is an existing file.
fn first_existing(paths: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(paths).find(|path| path.is_file())
}

fn parse_server(server: &str) -> Result<Url, KubeError> {
    Url::parse(server).map_err(|source| KubeError::InvalidServer {
        server: server.to_string(),
        source,
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>, KubeError> {
    fs::read(path).map_err(|source| KubeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Kubeconfig document ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct Kubeconfig {
    clusters: Vec<NamedCluster>,
    users: Vec<NamedUser>,
    contexts: Vec<NamedContext>,
    current_context: String,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct ClusterEntry {
    server: String,
    certificate_authority: Option<String>,
    certificate_authority_data: Option<String>,
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: UserEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct UserEntry {
    token: Option<String>,
    #[serde(rename = "tokenFile")]
    token_file: Option<String>,
    client_certificate: Option<String>,
    client_certificate_data: Option<String>,
    client_key: Option<String>,
    client_key_data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContextEntry {
    cluster: String,
    user: String,
}

impl Kubeconfig {
    fn resolve(self, context: Option<&str>, base_dir: &Path) -> Result<ClusterConfig, KubeError> {
        let context_name = match context {
            Some(name) => name,
            None if !self.current_context.is_empty() => self.current_context.as_str(),
            None => return Err(KubeError::NoCurrentContext),
        };
        let context = self
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .map(|c| &c.context)
            .ok_or_else(|| KubeError::ContextNotFound(context_name.to_string()))?;
        debug!(context = context_name, cluster = %context.cluster, user = %context.user, "selected kubeconfig context");

        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == context.cluster)
            .map(|c| &c.cluster)
            .ok_or_else(|| KubeError::ClusterNotFound(context.cluster.clone()))?;

        let mut config = ClusterConfig::for_server(parse_server(&cluster.server)?);
        config.accept_invalid_certs = cluster.insecure_skip_tls_verify;
        if let Some(ca) = inline_or_file(
            "certificate-authority-data",
            cluster.certificate_authority_data.as_deref(),
            cluster.certificate_authority.as_deref(),
            base_dir,
        )? {
            config.root_certificates.push(ca);
        }

        // An empty user name means anonymous access.
        if context.user.is_empty() {
            return Ok(config);
        }
        let user = self
            .users
            .iter()
            .find(|u| u.name == context.user)
            .map(|u| &u.user)
            .ok_or_else(|| KubeError::UserNotFound(context.user.clone()))?;

        config.token = match (&user.token, &user.token_file) {
            (Some(token), _) if !token.is_empty() => Some(TokenSource::Static(token.clone())),
            (_, Some(file)) if !file.is_empty() => Some(TokenSource::File(base_dir.join(file))),
            _ => None,
        };

        let certificate = inline_or_file(
            "client-certificate-data",
            user.client_certificate_data.as_deref(),
            user.client_certificate.as_deref(),
            base_dir,
        )?;
        let key = inline_or_file(
            "client-key-data",
            user.client_key_data.as_deref(),
            user.client_key.as_deref(),
            base_dir,
        )?;
        config.identity_pem = match (certificate, key) {
            (Some(mut pem), Some(key)) => {
                pem.push(b'\n');
                pem.extend_from_slice(&key);
                Some(pem)
            }
            (Some(_), None) => return Err(KubeError::IncompleteClientCertificate("client-certificate")),
            (None, Some(_)) => return Err(KubeError::IncompleteClientCertificate("client-key")),
            (None, None) => None,
        };

        Ok(config)
    }
}

/// Inline base64 data wins over a file path; relative paths are taken
/// from the kubeconfig's directory.
fn inline_or_file(
    field: &'static str,
    data: Option<&str>,
    file: Option<&str>,
    base_dir: &Path,
) -> Result<Option<Vec<u8>>, KubeError> {
    if let Some(data) = data.filter(|d| !d.is_empty()) {
        return STANDARD
            .decode(data.trim())
            .map(Some)
            .map_err(|source| KubeError::Base64 { field, source });
    }
    match file.filter(|f| !f.is_empty()) {
        Some(file) => read_file(&base_dir.join(file)).map(Some),
        None => Ok(None),
    }
}
