//! Minimal Kubernetes API client: pod lookups and the core/v1 event feed.

use std::time::Duration;

use async_trait::async_trait;
use eventexporter_core::{EventList, KubeSettings, Pod};
use eventexporter_rules::{FetchError, RelatedObjectFetcher};
use reqwest::{Certificate, Identity, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::config::{ClusterConfig, TokenSource};
use super::error::KubeError;

/// Only connection setup is bounded. Lookups and lists wait for the server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// `Status` body the API server returns with error responses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiStatus {
    pub code: u16,
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct KubeClient {
    http: reqwest::Client,
    /// API server root, always ending in `/`.
    base: Url,
    token: Option<TokenSource>,
}

impl KubeClient {
    pub fn new(config: ClusterConfig) -> Result<Self, KubeError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        for pem in &config.root_certificates {
            builder = builder.add_root_certificate(Certificate::from_pem(pem)?);
        }
        if let Some(pem) = &config.identity_pem {
            builder = builder.identity(Identity::from_pem(pem)?);
        }

        let mut base = config.server;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http: builder.build()?,
            base,
            token: config.token,
        })
    }

    pub fn from_settings(settings: &KubeSettings) -> Result<Self, KubeError> {
        Self::new(ClusterConfig::load(settings)?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    // ── Requests ────────────────────────────────────────────────────

    pub async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, KubeError> {
        let url = self.url(&format!("api/v1/namespaces/{namespace}/pods/{name}"))?;
        self.get_json(url).await
    }

    /// List events, cluster-wide or in one namespace.
    pub async fn list_events(&self, namespace: Option<&str>) -> Result<EventList, KubeError> {
        let url = self.url(&events_path(namespace))?;
        self.get_json(url).await
    }

    /// Open a watch on events from `resource_version`.
    ///
    /// The returned response streams newline-delimited watch events.
    pub async fn watch_events(
        &self,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> Result<Response, KubeError> {
        let mut url = self.url(&events_path(namespace))?;
        url.query_pairs_mut()
            .append_pair("watch", "true")
            .append_pair("resourceVersion", resource_version)
            .append_pair("allowWatchBookmarks", "true");
        debug!(%url, "opening event watch");

        let response = self.authorized(self.http.get(url))?.send().await?;
        check_status(response).await
    }

    fn url(&self, path: &str) -> Result<Url, KubeError> {
        self.base.join(path).map_err(|source| KubeError::InvalidServer {
            server: self.base.to_string(),
            source,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, KubeError> {
        Ok(match &self.token {
            Some(source) => request.bearer_auth(source.token()?),
            None => request,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, KubeError> {
        let response = self.authorized(self.http.get(url))?.send().await?;
        let body = check_status(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn events_path(namespace: Option<&str>) -> String {
    match namespace {
        Some(namespace) => format!("api/v1/namespaces/{namespace}/events"),
        None => "api/v1/events".to_string(),
    }
}

/// Turn non-2xx responses into [`KubeError::Api`], keeping the server's message.
async fn check_status(response: Response) -> Result<Response, KubeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ApiStatus>(&body)
        .ok()
        .map(|s| s.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
    Err(KubeError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RelatedObjectFetcher for KubeClient {
    async fn fetch_pod(&self, namespace: &str, name: &str) -> Result<Pod, FetchError> {
        self.get_pod(namespace, name).await.map_err(|e| {
            if e.is_not_found() {
                FetchError::NotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }
            } else {
                FetchError::Unavailable(e.to_string())
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::net::SocketAddr;

    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    /// Serve `app` on an ephemeral port and return a client pointed at it.
    pub(crate) async fn serve(app: Router) -> (KubeClient, SocketAddr) {
        serve_with_token(app, "secret").await
    }

    async fn serve_with_token(app: Router, token: &str) -> (KubeClient, SocketAddr) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let server = Url::parse(&format!("http://{addr}")).unwrap();
        let mut config = ClusterConfig::for_server(server);
        config.token = Some(TokenSource::Static(token.to_string()));
        (KubeClient::new(config).unwrap(), addr)
    }

    async fn pod_handler(Path((namespace, name)): Path<(String, String)>, headers: HeaderMap) -> impl IntoResponse {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer secret") {
            return (StatusCode::UNAUTHORIZED, Json(json!({"kind": "Status", "code": 401, "message": "Unauthorized"})));
        }
        if name != "web-1" {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "kind": "Status",
                    "code": 404,
                    "reason": "NotFound",
                    "message": format!("pods \"{name}\" not found"),
                })),
            );
        }
        (
            StatusCode::OK,
            Json(json!({
                "kind": "Pod",
                "apiVersion": "v1",
                "metadata": {"name": name, "namespace": namespace},
                "spec": {"nodeName": "node-3", "containers": [{"name": "app"}]},
                "status": {"phase": "Running"},
            })),
        )
    }

    fn api() -> Router {
        Router::new()
            .route("/api/v1/namespaces/{namespace}/pods/{name}", get(pod_handler))
            .route(
                "/api/v1/namespaces/{namespace}/events",
                get(|Path(namespace): Path<String>, Query(query): Query<std::collections::HashMap<String, String>>| async move {
                    assert!(!query.contains_key("watch"));
                    Json(json!({
                        "kind": "EventList",
                        "metadata": {"resourceVersion": "42"},
                        "items": [{
                            "metadata": {"name": "e1", "namespace": namespace},
                            "reason": "Scheduled",
                            "type": "Normal",
                        }],
                    }))
                }),
            )
    }

    #[tokio::test]
    async fn fetches_pod_with_bearer_token() {
        let (client, _) = serve(api()).await;
        let pod = client.get_pod("shop", "web-1").await.unwrap();
        assert_eq!(pod.type_meta.kind, "Pod");
        assert_eq!(pod.metadata.namespace, "shop");
        assert_eq!(pod.spec.node_name, "node-3");
        assert_eq!(pod.status.phase, "Running");
    }

    #[tokio::test]
    async fn missing_pod_maps_to_not_found() {
        let (client, _) = serve(api()).await;
        let err = client.fetch_pod("shop", "web-2").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { ref name, .. } if name == "web-2"));

        let err = client.get_pod("shop", "web-2").await.unwrap_err();
        assert!(matches!(err, KubeError::Api { status: 404, ref message } if message == "pods \"web-2\" not found"));
    }

    #[tokio::test]
    async fn wrong_token_is_fatal() {
        let (client, _) = serve_with_token(api(), "wrong").await;

        let err = client.get_pod("shop", "web-1").await.unwrap_err();
        assert!(err.is_fatal());
        let err = client.fetch_pod("shop", "web-1").await.unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));
    }

    #[tokio::test]
    async fn lists_namespaced_events() {
        let (client, _) = serve(api()).await;
        let list = client.list_events(Some("shop")).await.unwrap();
        assert_eq!(list.metadata.resource_version, "42");
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].reason, "Scheduled");
        assert_eq!(list.items[0].event_type, "Normal");
    }

    #[tokio::test]
    async fn slow_pod_lookup_waits_for_the_server() {
        let app = Router::new().route(
            "/api/v1/namespaces/{namespace}/pods/{name}",
            get(|path: Path<(String, String)>, headers: HeaderMap| async move {
                tokio::time::sleep(Duration::from_secs(32)).await;
                pod_handler(path, headers).await
            }),
        );
        let (client, _) = serve(app).await;

        let started = std::time::Instant::now();
        let pod = client.fetch_pod("shop", "web-1").await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(32));
        assert_eq!(pod.spec.node_name, "node-3");
    }

    #[tokio::test]
    async fn server_path_prefix_is_kept() {
        let config = ClusterConfig::for_server(Url::parse("https://proxy.example.com/k8s/cluster-a").unwrap());
        let client = KubeClient::new(config).unwrap();
        assert_eq!(client.base_url().as_str(), "https://proxy.example.com/k8s/cluster-a/");
        assert_eq!(
            client.url("api/v1/events").unwrap().as_str(),
            "https://proxy.example.com/k8s/cluster-a/api/v1/events"
        );
    }
}
