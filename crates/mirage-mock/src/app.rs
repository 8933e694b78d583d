//! Wiring: builds every service from a [`ServerConfig`] and runs the
//! listeners until shutdown.

use crate::admin::ContractAdminService;
use crate::config::ServerConfig;
use crate::contract::payload::BodyResolver;
use crate::contract::{ContractCompiler, ContractParser, ContractSource, FileContractSource};
use crate::engine::RequestProcessor;
use crate::kafka::{InMemoryKafkaStore, KafkaScenarioService, ScenarioExecutionRegistry};
use crate::reload::{ContractWatcher, ReloadService};
use crate::scheduler::RuntimeScheduler;
use crate::server::{HttpServer, ProxyClient, ServerRole, ServerState};
use crate::snapshot::SnapshotRegistry;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

pub struct MirageApp {
    config: ServerConfig,
    state: Arc<ServerState>,
    reload: Arc<ReloadService>,
    runtime: HttpServer,
    admin: HttpServer,
    shutdown_tx: watch::Sender<bool>,
}

impl MirageApp {
    /// Load and compile the initial contract, build the services and bind
    /// both listeners. An invalid initial contract aborts startup.
    pub async fn bootstrap(config: ServerConfig) -> anyhow::Result<Self> {
        let source: Arc<dyn ContractSource> =
            Arc::new(FileContractSource::new(config.contract_path.clone()));
        let text = source.load().await?;
        let raw = ContractParser::parse(&text)
            .with_context(|| format!("Invalid contract {}", config.contract_path.display()))?;

        let compiler = Arc::new(ContractCompiler::new(BodyResolver::new(
            config.workspace_root.clone(),
        )));
        let compiled = compiler
            .compile(&raw)
            .with_context(|| format!("Invalid contract {}", config.contract_path.display()))?;

        let registry = Arc::new(SnapshotRegistry::new(compiled.snapshot, compiled.fallback));
        info!(
            version = %registry.active_version(),
            routes = registry.active().snapshot().router().len(),
            "Initial snapshot activated"
        );

        let write_lock = Arc::new(Mutex::new(()));
        let reload = Arc::new(ReloadService::new(
            Arc::clone(&source),
            Arc::clone(&compiler),
            Arc::clone(&registry),
            Arc::clone(&write_lock),
        ));
        let contracts = ContractAdminService::new(
            source,
            compiler,
            Arc::clone(&registry),
            write_lock,
        );
        let kafka = KafkaScenarioService::new(
            Arc::clone(&registry),
            Arc::new(ScenarioExecutionRegistry::new()),
            Arc::new(RuntimeScheduler::current()?),
            Arc::new(InMemoryKafkaStore::new()),
        );

        let state = Arc::new(ServerState::new(
            RequestProcessor::new(Arc::clone(&registry)),
            ProxyClient::new(registry)?,
            contracts,
            Arc::clone(&reload),
            kafka,
            config.admin_prefix.clone(),
        ));

        let runtime = HttpServer::bind(config.runtime_addr, ServerRole::Runtime, Arc::clone(&state))
            .await
            .with_context(|| format!("Failed to bind runtime port {}", config.runtime_addr))?;
        let admin = HttpServer::bind(config.admin_addr, ServerRole::Admin, Arc::clone(&state))
            .await
            .with_context(|| format!("Failed to bind admin port {}", config.admin_addr))?;

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            state,
            reload,
            runtime,
            admin,
            shutdown_tx,
        })
    }

    pub fn runtime_addr(&self) -> std::io::Result<SocketAddr> {
        self.runtime.local_addr()
    }

    pub fn admin_addr(&self) -> std::io::Result<SocketAddr> {
        self.admin.local_addr()
    }

    /// Sending `true` stops the listeners, the watcher and every running
    /// scenario execution.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tasks = vec![
            tokio::spawn(self.runtime.run(self.shutdown_tx.subscribe())),
            tokio::spawn(self.admin.run(self.shutdown_tx.subscribe())),
        ];

        if let Some(interval) = self.config.watch {
            let watcher = ContractWatcher::new(
                self.config.contract_path.clone(),
                self.config.workspace_root.clone(),
                Arc::clone(&self.reload),
                self.shutdown_tx.subscribe(),
            )
            .with_poll_interval(interval);
            tasks.push(tokio::spawn(watcher.run()));
        }

        while !*shutdown_rx.borrow_and_update() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }

        let stopped = self.state.kafka.stop_all();
        if stopped > 0 {
            info!(stopped, "Stopped running kafka executions");
        }
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Server task ended abnormally: {}", e);
            }
        }
        info!("Mirage stopped");
        Ok(())
    }

    /// Run until ctrl-c.
    pub async fn run_until_ctrl_c(self) -> anyhow::Result<()> {
        let shutdown_tx = self.shutdown_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for ctrl-c: {}", e);
                return;
            }
            info!("Shutdown signal received");
            shutdown_tx.send_replace(true);
        });
        self.run().await
    }
}
