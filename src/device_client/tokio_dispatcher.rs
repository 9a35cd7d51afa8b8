// SPDX-License-Identifier: MPL-2.0

//! Tokio-backed completion dispatcher.
//!
//! Same contract as [`CompletionDispatcher`], delivered by a tokio task
//! instead of a dedicated thread: handle methods are async, commands
//! travel over a bounded `tokio::sync::mpsc` channel, and the worker
//! sleeps until the earliest pending deadline rather than polling at a
//! fixed interval.
//!
//! [`CompletionDispatcher`]: super::dispatcher::CompletionDispatcher

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::callback::MessageCallback;
use super::error::{DeviceClientError, DeviceClientResult};
use super::opts::DispatcherConfig;
use super::pending::{OperationKind, PendingOperations};

/// Commands sent from handles to the worker task.
enum TokioDispatcherCommand {
    /// Register a sink under a handle-allocated id
    Register {
        id: u64,
        kind: OperationKind,
        sink: Box<dyn MessageCallback>,
        timeout: Option<Duration>,
    },
    /// Complete an operation successfully
    Succeed { id: u64 },
    /// Complete an operation unsuccessfully
    Fail { id: u64 },
    /// Fail every pending operation
    FailAll,
    /// Shutdown the worker task
    Shutdown,
}

/// Completion dispatcher backed by a tokio task.
///
/// Callbacks are synchronous and run inside the worker task; they must
/// return promptly or they stall every completion behind them. Dropping
/// the handle without calling [`shutdown`] closes the command channel,
/// which makes the worker fail whatever is still pending and exit.
///
/// [`shutdown`]: TokioCompletionDispatcher::shutdown
pub struct TokioCompletionDispatcher {
    /// Command sender to the worker task
    command_tx: mpsc::Sender<TokioDispatcherCommand>,
    /// Handle to the worker task
    worker_handle: JoinHandle<()>,
    /// Next operation id handed out by `register`
    next_id: AtomicU64,
    /// Dispatcher configuration
    config: DispatcherConfig,
}

impl TokioCompletionDispatcher {
    /// Create a dispatcher and spawn its worker task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: DispatcherConfig) -> DeviceClientResult<Self> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(config.command_queue_size);
        let worker = TokioDispatcherWorker::new(command_rx, config.clone());
        let worker_handle = tokio::spawn(async move {
            worker.run().await;
        });

        Ok(TokioCompletionDispatcher {
            command_tx,
            worker_handle,
            next_id: AtomicU64::new(1),
            config,
        })
    }

    /// Create a dispatcher with the default configuration.
    pub fn with_default_config() -> DeviceClientResult<Self> {
        Self::new(DispatcherConfig::default())
    }

    /// Register a sink for one outstanding operation (non-blocking).
    ///
    /// Same contract as the thread dispatcher: the returned id is
    /// allocated before the registration reaches the worker, the
    /// configured `default_timeout` applies when no explicit timeout is
    /// given, and a sink the worker cannot accept receives `on_failure`.
    pub async fn register(
        &self,
        kind: OperationKind,
        sink: Box<dyn MessageCallback>,
        timeout: Option<Duration>,
    ) -> DeviceClientResult<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timeout = timeout.or(self.config.default_timeout);
        self.send_command(TokioDispatcherCommand::Register {
            id,
            kind,
            sink,
            timeout,
        })
        .await?;
        Ok(id)
    }

    /// Complete an operation successfully (non-blocking).
    pub async fn succeed(&self, id: u64) -> DeviceClientResult<()> {
        self.send_command(TokioDispatcherCommand::Succeed { id })
            .await
    }

    /// Complete an operation unsuccessfully (non-blocking).
    pub async fn fail(&self, id: u64) -> DeviceClientResult<()> {
        self.send_command(TokioDispatcherCommand::Fail { id }).await
    }

    /// Fail every pending operation, e.g. on connection loss.
    pub async fn fail_all(&self) -> DeviceClientResult<()> {
        self.send_command(TokioDispatcherCommand::FailAll).await
    }

    /// Shutdown the dispatcher and wait for the worker task to finish.
    ///
    /// Operations still pending when the shutdown command is processed
    /// are failed, exactly once each.
    pub async fn shutdown(self) -> DeviceClientResult<()> {
        let _ = self.send_command(TokioDispatcherCommand::Shutdown).await;

        self.worker_handle
            .await
            .map_err(|_| DeviceClientError::InternalError {
                message: "dispatcher worker task panicked".to_string(),
            })
    }

    /// Send a command to the worker task
    async fn send_command(&self, command: TokioDispatcherCommand) -> DeviceClientResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| DeviceClientError::ChannelClosed {
                channel: "dispatcher commands".to_string(),
            })
    }
}

/// Worker task that owns the pending-operation registry
struct TokioDispatcherWorker {
    /// Command receiver from handles
    command_rx: mpsc::Receiver<TokioDispatcherCommand>,
    /// The registry of outstanding operations
    pending: PendingOperations,
    /// Worker configuration
    config: DispatcherConfig,
}

impl TokioDispatcherWorker {
    fn new(command_rx: mpsc::Receiver<TokioDispatcherCommand>, config: DispatcherConfig) -> Self {
        TokioDispatcherWorker {
            command_rx,
            pending: PendingOperations::new(config.max_pending),
            config,
        }
    }

    /// Main worker task loop
    async fn run(mut self) {
        loop {
            // Wake at the earliest deadline; fall back to the sweep
            // interval so stale deadline slots get cleaned eventually.
            let wake_at = self
                .pending
                .next_deadline()
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(|| tokio::time::Instant::now() + self.config.sweep_interval);

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(command) => {
                            if !self.handle_command(command) {
                                break;
                            }
                        }
                        None => {
                            // Every handle dropped without an explicit shutdown.
                            debug!("dispatcher handles gone, stopping worker");
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(wake_at) => {
                    self.pending.expire(Instant::now());
                }
            }
        }

        let abandoned = self.pending.fail_all();
        if abandoned > 0 {
            warn!(abandoned, "failed operations still pending at shutdown");
        }
    }

    /// Handle a command from a dispatcher handle
    fn handle_command(&mut self, command: TokioDispatcherCommand) -> bool {
        match command {
            TokioDispatcherCommand::Register {
                id,
                kind,
                mut sink,
                timeout,
            } => {
                // The handle already returned the id, so a rejected sink
                // still gets its one terminal notification here.
                if self.pending.is_full() {
                    warn!(id, kind = %kind, "registry full, failing operation");
                    sink.on_failure();
                } else if let Err(e) = self.pending.register_with_id(id, kind, sink, timeout) {
                    // Unreachable with handle-allocated ids.
                    error!(id, kind = %kind, error = %e, "registration rejected");
                }
            }
            TokioDispatcherCommand::Succeed { id } => {
                if let Err(e) = self.pending.succeed(id) {
                    error!(id, error = %e, "cannot complete operation");
                }
            }
            TokioDispatcherCommand::Fail { id } => {
                if let Err(e) = self.pending.fail(id) {
                    error!(id, error = %e, "cannot fail operation");
                }
            }
            TokioDispatcherCommand::FailAll => {
                self.pending.fail_all();
            }
            TokioDispatcherCommand::Shutdown => {
                return false;
            }
        }
        true
    }
}
