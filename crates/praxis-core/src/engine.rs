// ── Engine facade ──
//
// Lifecycle management for one runtime connection. A single driver task
// owns the GraphSynchronizer and processes connection events, inbound
// frames, caller commands, and the pending-request sweep one at a time.
// Everything else reads the NodeStore.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use praxis_api::{ConnectionEvent, ConnectionState, WebSocketConnection};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::EngineConfig;
use crate::dispatch::DispatchReport;
use crate::error::CoreError;
use crate::interpreter::{Action, CommandInterpreter, InterpreterContext, InterpreterResponse};
use crate::model::{Node, NodeAddress, NodeInfo};
use crate::store::{NodeStore, SyncStatus};
use crate::stream::EntityStream;
use crate::sync::GraphSynchronizer;

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── Engine ───────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Owns the connection, the
/// mirrored graph, and the driver task. Dropping the last clone stops the
/// driver and closes the socket.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    connection: WebSocketConnection,
    store: Arc<NodeStore>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Engine {
    /// Create an engine from configuration. Does NOT connect; call
    /// [`connect()`](Self::connect) to open the socket.
    pub fn new(config: EngineConfig) -> Self {
        let connection = WebSocketConnection::new(config.url.clone(), config.connect_options());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(EngineInner {
                config,
                connection,
                store: Arc::new(NodeStore::new()),
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.inner.store
    }

    pub fn connection(&self) -> &WebSocketConnection {
        &self.inner.connection
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Start a connection attempt.
    ///
    /// Returns `Ok(false)` without doing anything once the retry limit has
    /// been reached; [`disconnect()`](Self::disconnect) re-arms it. The
    /// outcome of the attempt is observed through
    /// [`connection_state()`](Self::connection_state) or
    /// [`wait_until_connected()`](Self::wait_until_connected).
    pub async fn connect(&self) -> Result<bool, CoreError> {
        self.ensure_driver().await?;
        let started = self.inner.connection.connect().await;
        if !started {
            warn!(
                url = %self.inner.config.url,
                "retry limit reached, disconnect to re-arm reconnection"
            );
        }
        Ok(started)
    }

    /// Close the socket and re-arm reconnection. The mirror is cleared
    /// by the driver when the disconnect is observed.
    pub async fn disconnect(&self) {
        self.inner.connection.disconnect().await;
        debug!("engine disconnected");
    }

    /// Wait for the current attempt to open.
    ///
    /// Fails fast with [`CoreError::ConnectionFailed`] once no attempt is in
    /// flight and the socket is still closed.
    pub async fn wait_until_connected(&self, timeout: Duration) -> Result<(), CoreError> {
        let mut rx = self.inner.connection.watch_state();
        let url = self.inner.config.url.to_string();

        let wait = async {
            loop {
                {
                    let state = rx.borrow_and_update();
                    if state.connected {
                        return Ok(());
                    }
                    if !state.connecting {
                        let reason = state
                            .last_failure
                            .clone()
                            .unwrap_or_else(|| "no connection attempt in progress".into());
                        return Err(CoreError::ConnectionFailed { url, reason });
                    }
                }
                if rx.changed().await.is_err() {
                    return Err(CoreError::EngineStopped);
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| timeout_error(timeout, "connection"))?
    }

    /// [`connect()`](Self::connect), then wait for the socket to open.
    pub async fn connect_and_wait(&self, timeout: Duration) -> Result<(), CoreError> {
        if !self.connect().await? {
            return Err(CoreError::ConnectionFailed {
                url: self.inner.config.url.to_string(),
                reason: format!(
                    "gave up after {} failed attempts",
                    self.inner.config.max_reconnect_attempts
                ),
            });
        }
        self.wait_until_connected(timeout).await
    }

    /// Wait until the current graph fetch has settled: every request it
    /// caused has been answered or swept.
    pub async fn wait_for_sync(&self, timeout: Duration) -> Result<SyncStatus, CoreError> {
        let mut sync_rx = self.inner.store.subscribe_sync();
        let mut conn_rx = self.inner.connection.watch_state();

        let wait = async {
            loop {
                {
                    let status = sync_rx.borrow_and_update();
                    if status.epoch > 0 && !status.in_progress && status.last_sync.is_some() {
                        return Ok(status.clone());
                    }
                }
                {
                    let state = conn_rx.borrow_and_update();
                    if !state.connected && !state.connecting {
                        return Err(CoreError::Disconnected);
                    }
                }
                tokio::select! {
                    changed = sync_rx.changed() => {
                        if changed.is_err() {
                            return Err(CoreError::EngineStopped);
                        }
                    }
                    changed = conn_rx.changed() => {
                        if changed.is_err() {
                            return Err(CoreError::EngineStopped);
                        }
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| timeout_error(timeout, "graph synchronization"))?
    }

    /// Stop the driver and close the socket. The engine cannot be
    /// reconnected afterwards.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "driver task ended abnormally");
            }
        }
        drop(handles);

        self.inner.connection.disconnect().await;
        debug!("engine shut down");
    }

    // ── One-shot convenience ─────────────────────────────────────────

    /// One-shot: connect, wait for the first full sync, run `f`, shut down.
    ///
    /// The engine is shut down whether or not `f` succeeds. Callers may use
    /// their own error type as long as it absorbs [`CoreError`].
    pub async fn oneshot<F, Fut, T, E>(config: EngineConfig, timeout: Duration, f: F) -> Result<T, E>
    where
        F: FnOnce(Engine) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let engine = Engine::new(config);
        let result = async {
            engine.connect_and_wait(timeout).await?;
            engine.wait_for_sync(timeout).await?;
            f(engine.clone()).await
        }
        .await;
        engine.shutdown().await;
        result
    }

    // ── Command execution ────────────────────────────────────────────

    /// Execute a command on the driver task.
    ///
    /// Returns once the transport has accepted or refused the request;
    /// replies from the runtime show up later in the store.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        self.ensure_driver().await?;

        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::EngineStopped)?;

        rx.await.map_err(|_| CoreError::EngineStopped)?
    }

    /// Start a fresh graph synchronization.
    pub async fn fetch_graph(&self) -> Result<bool, CoreError> {
        sent(self.execute(Command::FetchGraph).await?)
    }

    /// Re-read one node's info and properties.
    pub async fn fetch_node_details(&self, address: &NodeAddress) -> Result<bool, CoreError> {
        sent(
            self.execute(Command::FetchNodeDetails {
                address: address.clone(),
            })
            .await?,
        )
    }

    /// Ask the runtime to set one property. The mirror only changes when
    /// the runtime reports the new value.
    pub async fn update_property(
        &self,
        address: &NodeAddress,
        property: &str,
        value: Value,
    ) -> Result<bool, CoreError> {
        sent(
            self.execute(Command::UpdateProperty {
                address: address.clone(),
                property: property.to_owned(),
                value,
            })
            .await?,
        )
    }

    /// Send the node actions; audio/video actions come back in the report.
    pub async fn dispatch_actions(&self, actions: Vec<Action>) -> Result<DispatchReport, CoreError> {
        match self.execute(Command::DispatchActions { actions }).await? {
            CommandResult::Dispatched(report) => Ok(report),
            other => Err(unexpected(&other)),
        }
    }

    /// Run `command` through `interpreter` and dispatch its actions.
    ///
    /// `context.node_count` is filled in from the mirror. Nothing is
    /// dispatched when the interpreter reports failure.
    pub async fn interpret_and_dispatch<I: CommandInterpreter>(
        &self,
        interpreter: &I,
        command: &str,
        mut context: InterpreterContext,
    ) -> Result<(InterpreterResponse, DispatchReport), CoreError> {
        context.node_count = self.inner.store.node_count();
        let response = interpreter.interpret(command, &context).await?;

        if !response.success {
            info!(error = ?response.error, "interpreter declined command");
            return Ok((response, DispatchReport::default()));
        }

        let report = self.dispatch_actions(response.actions.clone()).await?;
        Ok((response, report))
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.watch_state()
    }

    pub fn connection_status(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    // ── Snapshot accessors (delegate to NodeStore) ───────────────────

    pub fn nodes(&self) -> EntityStream<Node> {
        self.inner.store.subscribe_nodes()
    }

    pub fn nodes_snapshot(&self) -> Arc<Vec<Arc<Node>>> {
        self.inner.store.nodes_snapshot()
    }

    pub fn node(&self, address: &NodeAddress) -> Option<Arc<Node>> {
        self.inner.store.node(address)
    }

    /// Like [`node()`](Self::node) but reports absence as an error.
    pub fn require_node(&self, address: &NodeAddress) -> Result<Arc<Node>, CoreError> {
        self.node(address).ok_or_else(|| CoreError::NodeNotFound {
            address: address.to_string(),
        })
    }

    /// Look a node up by its flat id (`/audio/osc` → `_audio_osc`).
    pub fn node_by_id(&self, id: &str) -> Option<Arc<Node>> {
        self.inner.store.node_by_id(id)
    }

    pub fn root_info(&self) -> Option<Arc<NodeInfo>> {
        self.inner.store.root_info()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.store.last_error()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.inner.store.sync_status()
    }

    // ── Driver startup ───────────────────────────────────────────────

    /// Spawn the driver task on first use.
    async fn ensure_driver(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::EngineStopped);
        }

        let Some(commands) = self.inner.command_rx.lock().await.take() else {
            return Ok(());
        };

        // Subscribe before any connect so the first `Connected` is seen.
        let events = self.inner.connection.subscribe();
        let sync = GraphSynchronizer::new(
            self.inner.connection.clone(),
            Arc::clone(&self.inner.store),
            self.inner.config.request_timeout,
        );
        let handle = tokio::spawn(driver_task(
            sync,
            events,
            commands,
            self.inner.config.sweep_interval(),
            self.inner.cancel.clone(),
        ));
        self.inner.task_handles.lock().await.push(handle);
        debug!("driver task started");
        Ok(())
    }
}

// ── Driver task ──────────────────────────────────────────────────────

/// The single event queue: connection events, frames, commands, sweeps.
async fn driver_task(
    mut sync: GraphSynchronizer<WebSocketConnection>,
    mut events: broadcast::Receiver<ConnectionEvent>,
    mut commands: mpsc::Receiver<CommandEnvelope>,
    sweep_interval: Duration,
    cancel: CancellationToken,
) {
    let mut sweep = tokio::time::interval(sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    sweep.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(ConnectionEvent::Connected) => sync.on_connected(),
                Ok(ConnectionEvent::Disconnected { abnormal }) => {
                    if abnormal {
                        info!("connection lost, clearing mirror");
                    }
                    sync.on_disconnected();
                }
                Ok(ConnectionEvent::Frame(text)) => sync.handle_frame(&text),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "driver fell behind connection events, resynchronizing");
                    sync.on_disconnected();
                    if sync.sink().is_connected() {
                        sync.on_connected();
                    }
                }
                Err(RecvError::Closed) => break,
            },
            envelope = commands.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&mut sync, envelope.command);
                // Caller may have given up waiting; nothing to do then.
                let _ = envelope.response_tx.send(Ok(result));
            }
            _ = sweep.tick() => {
                sync.prune_expired();
            }
        }
    }

    debug!("driver task stopped");
}

// ── Command routing ──────────────────────────────────────────────────

fn route_command(sync: &mut GraphSynchronizer<WebSocketConnection>, cmd: Command) -> CommandResult {
    match cmd {
        Command::FetchGraph => CommandResult::Sent {
            accepted: sync.fetch_graph(),
        },
        Command::FetchNodeDetails { address } => CommandResult::Sent {
            accepted: sync.fetch_node_details(&address),
        },
        Command::UpdateProperty {
            address,
            property,
            value,
        } => CommandResult::Sent {
            accepted: sync.update_property(&address, &property, value),
        },
        Command::DispatchActions { actions } => {
            CommandResult::Dispatched(sync.dispatch_actions(actions))
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn sent(result: CommandResult) -> Result<bool, CoreError> {
    match result {
        CommandResult::Sent { accepted } => Ok(accepted),
        other @ CommandResult::Dispatched(_) => Err(unexpected(&other)),
    }
}

fn unexpected(result: &CommandResult) -> CoreError {
    CoreError::Internal(format!("unexpected command result: {result:?}"))
}

fn timeout_error(timeout: Duration, waiting_for: &str) -> CoreError {
    CoreError::Timeout {
        timeout_secs: timeout.as_secs().max(1),
        waiting_for: waiting_for.to_owned(),
    }
}
