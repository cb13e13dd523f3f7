//! Execution-unit launchers.
//!
//! - **`ProcessLauncher`**: runs this binary's `unit` subcommand as a child
//!   process. Graceful stop is `POST /shutdown`, forced stop is a kill.
//! - **`InProcessLauncher`**: serves a `SearchUnit` from a tokio task. Graceful
//!   stop drains the axum server, forced stop aborts the task.

use super::handle::{UnitHandle, handle_pair};
use super::types::{HandleState, LaunchSpec, UnitEvent};
use crate::coordinator::client::HttpUnitClient;
use crate::error::{SearchError, SearchResult};
use crate::search::index::IndexKind;
use crate::unit::client::CoordinatorClient;
use crate::unit::datastore::Datastore;
use crate::unit::handlers::serve;
use crate::unit::service::SearchUnit;

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio::sync::{Notify, mpsc};

#[async_trait]
pub trait UnitLauncher: Send + Sync {
    async fn launch(&self, spec: LaunchSpec) -> SearchResult<UnitHandle>;
}

fn forward_lines<R>(reader: R, events: mpsc::UnboundedSender<UnitEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if events.send(UnitEvent::Output(line)).is_err() {
                break;
            }
        }
    });
}

pub struct ProcessLauncher {
    program: PathBuf,
    extra_args: Vec<String>,
    unit_client: HttpUnitClient,
}

impl ProcessLauncher {
    /// `extra_args` are appended to every `unit` invocation (data file,
    /// index kind, log level).
    pub fn new(program: PathBuf, extra_args: Vec<String>) -> Self {
        Self {
            program,
            extra_args,
            unit_client: HttpUnitClient::new(),
        }
    }

    /// Launches copies of the running executable.
    pub fn current_exe(extra_args: Vec<String>) -> SearchResult<Self> {
        let program = std::env::current_exe().map_err(|e| {
            SearchError::Connectivity(format!("Cannot locate own executable: {}", e))
        })?;
        Ok(Self::new(program, extra_args))
    }
}

#[async_trait]
impl UnitLauncher for ProcessLauncher {
    async fn launch(&self, spec: LaunchSpec) -> SearchResult<UnitHandle> {
        let host = spec
            .address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string());

        let mut child = Command::new(&self.program)
            .arg("unit")
            .arg("--id")
            .arg(&spec.unit_id)
            .arg("--host")
            .arg(&host)
            .arg("--port")
            .arg(spec.port.to_string())
            .arg("--coordinator")
            .arg(&spec.coordinator_url)
            .args(&self.extra_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SearchError::unavailable(&spec.unit_id, format!("spawn failed: {}", e)))?;

        tracing::info!(
            "Started unit {} (pid {:?}) on {}",
            spec.unit_id,
            child.id(),
            spec.address
        );

        let (handle, control) = handle_pair(spec.clone());
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, control.events.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, control.events.clone());
        }

        let client = self.unit_client.clone();
        tokio::spawn(async move {
            let mut control = control;
            control.set_state(HandleState::Running);

            let mut requested = false;
            let mut kill_sent = false;
            let code = loop {
                tokio::select! {
                    status = child.wait() => {
                        break status.ok().and_then(|s| s.code());
                    }
                    _ = &mut control.graceful, if !requested => {
                        requested = true;
                        control.set_state(HandleState::Stopping);
                        let client = client.clone();
                        let address = spec.address.clone();
                        let unit_id = spec.unit_id.clone();
                        tokio::spawn(async move {
                            if let Err(e) = client.request_shutdown(&address).await {
                                tracing::warn!("Graceful stop of {} failed: {}", unit_id, e);
                            }
                        });
                    }
                    _ = &mut control.kill, if !kill_sent => {
                        kill_sent = true;
                        requested = true;
                        control.set_state(HandleState::Stopping);
                        if let Err(e) = child.start_kill() {
                            tracing::error!("Failed to kill unit {}: {}", spec.unit_id, e);
                        }
                    }
                }
            };

            tracing::info!("Unit {} exited with code {:?}", spec.unit_id, code);
            control.exited(code, requested);
        });

        Ok(handle)
    }
}

pub struct InProcessLauncher {
    datastore: Arc<dyn Datastore>,
    index_kind: IndexKind,
    coordinator: Arc<dyn CoordinatorClient>,
}

impl InProcessLauncher {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        index_kind: IndexKind,
        coordinator: Arc<dyn CoordinatorClient>,
    ) -> Self {
        Self {
            datastore,
            index_kind,
            coordinator,
        }
    }
}

#[async_trait]
impl UnitLauncher for InProcessLauncher {
    async fn launch(&self, spec: LaunchSpec) -> SearchResult<UnitHandle> {
        let listener = TcpListener::bind(&spec.address)
            .await
            .map_err(|e| SearchError::unavailable(&spec.unit_id, format!("bind failed: {}", e)))?;

        let unit = SearchUnit::new(
            spec.unit_id.clone(),
            spec.address.clone(),
            self.datastore.clone(),
            self.index_kind,
        );
        let shutdown = Arc::new(Notify::new());
        let mut server = tokio::spawn(serve(unit.clone(), listener, shutdown.clone()));

        let (handle, control) = handle_pair(spec.clone());
        control.output(format!("serving on {}", spec.address));

        let coordinator = self.coordinator.clone();
        let registering = unit.clone();
        tokio::spawn(async move {
            if let Err(e) = registering.register(coordinator.as_ref()).await {
                tracing::warn!("Unit {} registration failed: {}", registering.id, e);
            }
        });

        tokio::spawn(async move {
            let mut control = control;
            control.set_state(HandleState::Running);

            let mut requested = false;
            let mut kill_sent = false;
            let code = loop {
                tokio::select! {
                    outcome = &mut server => {
                        break match outcome {
                            Ok(Ok(())) => Some(0),
                            Ok(Err(e)) => {
                                tracing::error!("Unit {} server failed: {}", spec.unit_id, e);
                                Some(1)
                            }
                            Err(_) => None,
                        };
                    }
                    _ = &mut control.graceful, if !requested => {
                        requested = true;
                        control.set_state(HandleState::Stopping);
                        shutdown.notify_one();
                    }
                    _ = &mut control.kill, if !kill_sent => {
                        kill_sent = true;
                        requested = true;
                        control.set_state(HandleState::Stopping);
                        server.abort();
                    }
                }
            };

            tracing::info!("Unit {} stopped", spec.unit_id);
            control.exited(code, requested);
        });

        Ok(handle)
    }
}
