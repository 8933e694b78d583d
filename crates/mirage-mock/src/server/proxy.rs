//! Forwarding for routes whose behavior is `proxy`.

use super::response::{error_reply, reply, status_code, HttpResponse, ResponseHeaders};
use crate::metrics;
use crate::snapshot::SnapshotRegistry;
use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode, Uri};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

const SKIPPED_REQUEST_HEADERS: [&str; 3] = ["host", "content-length", "connection"];
const SKIPPED_RESPONSE_HEADERS: [&str; 3] = ["transfer-encoding", "content-length", "connection"];

pub struct ProxyClient {
    client: reqwest::Client,
    registry: Arc<SnapshotRegistry>,
}

impl ProxyClient {
    pub fn new(registry: Arc<SnapshotRegistry>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, registry })
    }

    /// Forward to the proxy base URL of the snapshot that is active now,
    /// which may be newer than the one the request was routed against.
    pub async fn forward(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
    ) -> HttpResponse {
        let Some(target) = self.target_url(uri) else {
            metrics::record_proxy(StatusCode::BAD_GATEWAY.as_u16());
            return error_reply(StatusCode::BAD_GATEWAY, "Proxy not configured");
        };
        debug!("Proxy request to: {}", target);

        let mut upstream_headers = headers.clone();
        for name in SKIPPED_REQUEST_HEADERS {
            upstream_headers.remove(name);
        }

        let result = self
            .client
            .request(method.clone(), &target)
            .headers(upstream_headers)
            .body(body)
            .send()
            .await;

        let upstream = match result {
            Ok(upstream) => upstream,
            Err(e) => {
                error!("Proxy request to {} failed: {}", target, e);
                metrics::record_proxy(StatusCode::BAD_GATEWAY.as_u16());
                return error_reply(StatusCode::BAD_GATEWAY, "Bad Gateway");
            }
        };

        let status = upstream.status().as_u16();
        let upstream_headers = upstream.headers().clone();
        let body = match upstream.bytes().await {
            Ok(body) => body,
            Err(e) => {
                error!("Reading proxy response from {} failed: {}", target, e);
                metrics::record_proxy(StatusCode::BAD_GATEWAY.as_u16());
                return error_reply(StatusCode::BAD_GATEWAY, "Bad Gateway");
            }
        };
        metrics::record_proxy(status);

        let mut response = reply(status_code(status), body);
        for (name, value) in upstream_headers.iter() {
            if SKIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                continue;
            }
            if let Ok(value) = value.to_str() {
                response.set_header(name.as_str(), value);
            }
        }
        response
    }

    fn target_url(&self, uri: &Uri) -> Option<String> {
        let active = self.registry.active();
        let base = active.snapshot().settings().proxy_base_url.as_ref()?;
        Some(join_url(base.as_str(), uri))
    }
}

fn join_url(base: &str, uri: &Uri) -> String {
    format!(
        "{}{}{}",
        base.trim_end_matches('/'),
        uri.path(),
        uri.query().map(|q| format!("?{q}")).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::payload::BodyResolver;
    use crate::contract::{ContractCompiler, ContractParser};

    fn registry(yaml: &str) -> Arc<SnapshotRegistry> {
        let raw = ContractParser::parse(yaml).unwrap();
        let compiled = ContractCompiler::new(BodyResolver::new("/ws")).compile(&raw).unwrap();
        Arc::new(SnapshotRegistry::new(compiled.snapshot, compiled.fallback))
    }

    const WITH_PROXY: &str = r#"
settings: { proxy: { baseUrl: "http://upstream:9000/api/" } }
endpoints:
  - request: { method: GET, path: /a }
    response: { type: proxy }
"#;

    #[test]
    fn test_join_url_keeps_path_and_query() {
        let uri: Uri = "/users/1?x=1&y=2".parse().unwrap();
        assert_eq!(
            join_url("http://upstream:9000/api/", &uri),
            "http://upstream:9000/api/users/1?x=1&y=2"
        );
        let uri: Uri = "/plain".parse().unwrap();
        assert_eq!(join_url("http://h", &uri), "http://h/plain");
    }

    #[test]
    fn test_target_follows_active_snapshot() {
        let registry = registry(WITH_PROXY);
        let client = ProxyClient::new(Arc::clone(&registry)).unwrap();
        let uri: Uri = "/a".parse().unwrap();
        assert_eq!(
            client.target_url(&uri).as_deref(),
            Some("http://upstream:9000/api/a")
        );

        let raw = ContractParser::parse(&WITH_PROXY.replace("upstream:9000", "other:1")).unwrap();
        let compiled = ContractCompiler::new(BodyResolver::new("/ws")).compile(&raw).unwrap();
        let _old = registry.pin();
        registry.activate_new(compiled.snapshot, compiled.fallback);
        assert_eq!(
            client.target_url(&uri).as_deref(),
            Some("http://other:1/api/a")
        );
    }

    #[tokio::test]
    async fn test_unconfigured_proxy_is_bad_gateway() {
        let registry = registry(
            "endpoints:\n  - request: { method: GET, path: /a }\n    response: { type: proxy }\n",
        );
        let client = ProxyClient::new(registry).unwrap();
        let resp = client
            .forward(&Method::GET, &"/a".parse().unwrap(), &HeaderMap::new(), Bytes::new())
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
