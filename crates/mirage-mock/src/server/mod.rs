//! HTTP listeners: the mock runtime port and the admin port.

pub mod admin;
mod proxy;
pub mod response;
pub mod runtime;

pub use proxy::ProxyClient;

use crate::admin::ContractAdminService;
use crate::engine::RequestProcessor;
use crate::kafka::KafkaScenarioService;
use crate::reload::ReloadService;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Everything a request handler needs, shared by both listeners.
pub struct ServerState {
    pub processor: RequestProcessor,
    pub proxy: ProxyClient,
    pub contracts: ContractAdminService,
    pub reload: Arc<ReloadService>,
    pub kafka: KafkaScenarioService,
    admin_prefix: String,
}

impl ServerState {
    pub fn new(
        processor: RequestProcessor,
        proxy: ProxyClient,
        contracts: ContractAdminService,
        reload: Arc<ReloadService>,
        kafka: KafkaScenarioService,
        admin_prefix: impl Into<String>,
    ) -> Self {
        let admin_prefix = admin_prefix.into().trim_end_matches('/').to_string();
        Self {
            processor,
            proxy,
            contracts,
            reload,
            kafka,
            admin_prefix,
        }
    }

    pub fn admin_prefix(&self) -> &str {
        &self.admin_prefix
    }

    pub fn is_admin_path(&self, path: &str) -> bool {
        under_prefix(&self.admin_prefix, path).is_some()
    }

    /// The admin port accepts paths with or without the prefix.
    pub fn strip_admin_prefix<'a>(&self, path: &'a str) -> &'a str {
        under_prefix(&self.admin_prefix, path).unwrap_or(path)
    }
}

/// Remainder of `path` below `prefix`, matching whole segments only.
fn under_prefix<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    path.strip_prefix(prefix)
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    Runtime,
    Admin,
}

impl ServerRole {
    fn as_str(&self) -> &'static str {
        match self {
            ServerRole::Runtime => "runtime",
            ServerRole::Admin => "admin",
        }
    }
}

pub struct HttpServer {
    listener: TcpListener,
    role: ServerRole,
    state: Arc<ServerState>,
}

impl HttpServer {
    pub async fn bind(addr: SocketAddr, role: ServerRole, state: Arc<ServerState>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            role,
            state,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the shutdown flag flips to true. Each
    /// connection is served on its own task.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let role = self.role;
        match self.listener.local_addr() {
            Ok(addr) => info!("Mirage {} server listening on http://{}", role.as_str(), addr),
            Err(e) => debug!("Cannot read {} listener address: {}", role.as_str(), e),
        }

        loop {
            if *shutdown_rx.borrow_and_update() {
                info!("Mirage {} server shutting down", role.as_str());
                break;
            }
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let state = Arc::clone(&self.state);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let state = Arc::clone(&state);
                                    async move {
                                        match role {
                                            ServerRole::Runtime => runtime::handle_request(req, state).await,
                                            ServerRole::Admin => admin::route_request(req, state).await,
                                        }
                                    }
                                });
                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!("{} connection error: {}", role.as_str(), e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("{} accept error: {}", role.as_str(), e);
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
