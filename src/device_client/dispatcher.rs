// SPDX-License-Identifier: MPL-2.0

//! Thread-backed completion dispatcher.
//!
//! The dispatcher owns a [`PendingOperations`] registry on a dedicated
//! worker thread. Handles are cheap to use from any thread: they allocate
//! the operation id locally and send commands over a channel, so no caller
//! ever touches the registry directly. All terminal notifications are
//! delivered on the worker thread, never on the thread that issued the
//! operation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::callback::MessageCallback;
use super::error::{DeviceClientError, DeviceClientResult};
use super::opts::DispatcherConfig;
use super::pending::{OperationKind, PendingOperations};

/// Commands sent from handles to the worker thread.
enum DispatcherCommand {
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
    /// Shutdown the worker thread
    Shutdown,
}

/// Completion dispatcher backed by a dedicated worker thread.
///
/// Callbacks run on the worker thread; the exactly-once guarantee of
/// [`PendingOperations`] applies to every operation the dispatcher
/// accepts, including the shutdown path, where anything still pending is
/// failed before the worker exits.
pub struct CompletionDispatcher {
    /// Channel to send commands to the worker thread
    command_tx: Sender<DispatcherCommand>,
    /// Handle to the worker thread
    worker_handle: Option<JoinHandle<()>>,
    /// Next operation id handed out by `register`
    next_id: AtomicU64,
    /// Dispatcher configuration
    config: DispatcherConfig,
}

impl CompletionDispatcher {
    /// Create a dispatcher and spawn its worker thread.
    pub fn new(config: DispatcherConfig) -> DeviceClientResult<Self> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel();
        let worker = DispatcherWorker::new(command_rx, config.clone());
        let worker_handle = thread::Builder::new()
            .name("completion-dispatcher".to_string())
            .spawn(move || {
                worker.run();
            })
            .map_err(|e| DeviceClientError::InternalError {
                message: format!("failed to spawn dispatcher thread: {}", e),
            })?;

        Ok(CompletionDispatcher {
            command_tx,
            worker_handle: Some(worker_handle),
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
    /// Returns the operation id to complete against. Without an explicit
    /// timeout the configured `default_timeout` applies; `None` there
    /// means the operation waits until completed or the dispatcher shuts
    /// down. If the worker later rejects the registration (registry at
    /// capacity) the sink receives `on_failure`, preserving the
    /// one-notification contract for every accepted sink.
    pub fn register(
        &self,
        kind: OperationKind,
        sink: Box<dyn MessageCallback>,
        timeout: Option<Duration>,
    ) -> DeviceClientResult<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timeout = timeout.or(self.config.default_timeout);
        self.send_command(DispatcherCommand::Register {
            id,
            kind,
            sink,
            timeout,
        })?;
        Ok(id)
    }

    /// Complete an operation successfully (non-blocking).
    pub fn succeed(&self, id: u64) -> DeviceClientResult<()> {
        self.send_command(DispatcherCommand::Succeed { id })
    }

    /// Complete an operation unsuccessfully (non-blocking).
    pub fn fail(&self, id: u64) -> DeviceClientResult<()> {
        self.send_command(DispatcherCommand::Fail { id })
    }

    /// Fail every pending operation, e.g. on connection loss.
    pub fn fail_all(&self) -> DeviceClientResult<()> {
        self.send_command(DispatcherCommand::FailAll)
    }

    /// Shutdown the dispatcher and wait for the worker thread to finish.
    ///
    /// Operations still pending when the shutdown command is processed
    /// are failed, exactly once each.
    pub fn shutdown(mut self) -> DeviceClientResult<()> {
        let _ = self.send_command(DispatcherCommand::Shutdown);

        if let Some(handle) = self.worker_handle.take() {
            handle.join().map_err(|_| DeviceClientError::InternalError {
                message: "dispatcher worker thread panicked".to_string(),
            })?;
        }
        Ok(())
    }

    /// Send a command to the worker thread
    fn send_command(&self, command: DispatcherCommand) -> DeviceClientResult<()> {
        self.command_tx
            .send(command)
            .map_err(|_| DeviceClientError::ChannelClosed {
                channel: "dispatcher commands".to_string(),
            })
    }
}

impl Drop for CompletionDispatcher {
    fn drop(&mut self) {
        let _ = self.send_command(DispatcherCommand::Shutdown);
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Worker thread that owns the pending-operation registry
struct DispatcherWorker {
    /// Command receiver from handles
    command_rx: Receiver<DispatcherCommand>,
    /// The registry of outstanding operations
    pending: PendingOperations,
    /// Worker configuration
    config: DispatcherConfig,
}

impl DispatcherWorker {
    fn new(command_rx: Receiver<DispatcherCommand>, config: DispatcherConfig) -> Self {
        DispatcherWorker {
            command_rx,
            pending: PendingOperations::new(config.max_pending),
            config,
        }
    }

    /// Main worker thread loop
    fn run(mut self) {
        loop {
            match self.command_rx.recv_timeout(self.config.sweep_interval) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Every handle dropped without an explicit shutdown.
                    debug!("dispatcher handles gone, stopping worker");
                    break;
                }
            }

            self.pending.expire(Instant::now());
        }

        let abandoned = self.pending.fail_all();
        if abandoned > 0 {
            warn!(abandoned, "failed operations still pending at shutdown");
        }
    }

    /// Handle a command from a dispatcher handle
    fn handle_command(&mut self, command: DispatcherCommand) -> bool {
        match command {
            DispatcherCommand::Register {
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
            DispatcherCommand::Succeed { id } => {
                if let Err(e) = self.pending.succeed(id) {
                    error!(id, error = %e, "cannot complete operation");
                }
            }
            DispatcherCommand::Fail { id } => {
                if let Err(e) = self.pending.fail(id) {
                    error!(id, error = %e, "cannot fail operation");
                }
            }
            DispatcherCommand::FailAll => {
                self.pending.fail_all();
            }
            DispatcherCommand::Shutdown => {
                return false;
            }
        }
        true
    }
}
