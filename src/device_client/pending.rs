// SPDX-License-Identifier: MPL-2.0

//! Bookkeeping for outstanding non-blocking operations.
//!
//! The operation layer registers one callback sink per operation, populates
//! the sink's message with the result, and then completes the operation
//! through exactly one of [`PendingOperations::succeed`],
//! [`PendingOperations::fail`], or the [`PendingOperations::expire`] sweep.
//! An entry is removed from the registry before its callback runs, so a
//! second completion attempt for the same id cannot reach the sink.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::callback::MessageCallback;
use super::error::{DeviceClientError, DeviceClientResult};
use super::message::Message;

/// The kind of non-blocking operation a sink is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum OperationKind {
    Publish,
    Subscribe,
    Unsubscribe,
    ShadowGet,
    ShadowUpdate,
    ShadowDelete,
}

impl OperationKind {
    /// Lowercase operation name, used in log and error text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::ShadowGet => "shadow get",
            Self::ShadowUpdate => "shadow update",
            Self::ShadowDelete => "shadow delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry for one outstanding operation
struct PendingEntry {
    /// What the sink is waiting for
    kind: OperationKind,
    /// The callback sink; owns the message the result is written into
    sink: Box<dyn MessageCallback>,
    /// When the operation was registered
    registered_at: Instant,
    /// Absolute deadline, if the registration carried a timeout
    deadline: Option<Instant>,
}

/// Registry of callback sinks for outstanding non-blocking operations.
///
/// Guarantees exactly-once terminal notification per registered operation:
/// every completion path (`succeed`, `fail`, `expire`, `fail_all`) removes
/// the entry from the registry before invoking the callback, and an id that
/// is no longer present yields [`DeviceClientError::UnknownOperation`].
///
/// - O(1) lookups by operation id.
/// - Deadlines kept sorted for O(log n) expiry checks.
/// - Enforces a configurable pending-operation limit.
pub struct PendingOperations {
    /// Outstanding operations keyed by id
    entries: HashMap<u64, PendingEntry>,
    /// Operation ids grouped by deadline, earliest first
    deadlines: BTreeMap<Instant, Vec<u64>>,
    /// Next id handed out by `register`
    next_id: u64,
    /// Maximum number of outstanding operations allowed
    max_pending: usize,
}

impl PendingOperations {
    pub fn new(max_pending: usize) -> Self {
        Self {
            entries: HashMap::new(),
            deadlines: BTreeMap::new(),
            next_id: 1,
            max_pending,
        }
    }

    /// Check whether another operation can be registered.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_pending
    }

    /// Register a sink for one outstanding operation and return its id.
    ///
    /// Ids increase monotonically and are never reused. With a timeout the
    /// entry becomes eligible for [`expire`] once the deadline passes; with
    /// `None` it stays pending until completed or [`fail_all`].
    ///
    /// On [`DeviceClientError::PendingLimitReached`] the sink is dropped
    /// without notification; the error return is the caller's signal that
    /// the operation never started.
    ///
    /// [`expire`]: PendingOperations::expire
    /// [`fail_all`]: PendingOperations::fail_all
    pub fn register(
        &mut self,
        kind: OperationKind,
        sink: Box<dyn MessageCallback>,
        timeout: Option<Duration>,
    ) -> DeviceClientResult<u64> {
        let id = self.next_id;
        self.register_with_id(id, kind, sink, timeout)?;
        Ok(id)
    }

    /// Register a sink under a caller-allocated id.
    ///
    /// Used by the dispatchers, which allocate ids on the handle side so
    /// the id is available before the registration reaches the worker.
    /// Fails with [`DeviceClientError::DuplicateOperation`] if the id is
    /// already pending.
    pub fn register_with_id(
        &mut self,
        id: u64,
        kind: OperationKind,
        sink: Box<dyn MessageCallback>,
        timeout: Option<Duration>,
    ) -> DeviceClientResult<()> {
        if self.is_full() {
            return Err(DeviceClientError::PendingLimitReached {
                capacity: self.max_pending,
            });
        }
        if self.entries.contains_key(&id) {
            return Err(DeviceClientError::DuplicateOperation { id });
        }

        let now = Instant::now();
        let deadline = timeout.map(|timeout| now + timeout);
        if let Some(deadline) = deadline {
            self.deadlines.entry(deadline).or_default().push(id);
        }

        self.entries.insert(
            id,
            PendingEntry {
                kind,
                sink,
                registered_at: now,
                deadline,
            },
        );
        self.next_id = self.next_id.max(id + 1);

        debug!(id, kind = %kind, timeout = ?timeout, "registered operation");
        Ok(())
    }

    /// Mutable access to the message of a pending operation.
    ///
    /// The operation layer populates result fields through this before
    /// calling `succeed` or `fail`; the callback then observes the final
    /// values.
    pub fn message_mut(&mut self, id: u64) -> Option<&mut Message> {
        self.entries
            .get_mut(&id)
            .map(|entry| entry.sink.message_mut())
    }

    /// Complete an operation successfully.
    ///
    /// Removes the entry, invokes `on_success` on its sink, and returns
    /// the sink so the caller can extract the result message.
    pub fn succeed(&mut self, id: u64) -> DeviceClientResult<Box<dyn MessageCallback>> {
        let mut entry = self.take(id)?;
        debug!(
            id,
            kind = %entry.kind,
            elapsed = ?entry.registered_at.elapsed(),
            "operation succeeded"
        );
        entry.sink.on_success();
        Ok(entry.sink)
    }

    /// Complete an operation unsuccessfully.
    ///
    /// Removes the entry, invokes `on_failure` on its sink, and returns
    /// the sink.
    pub fn fail(&mut self, id: u64) -> DeviceClientResult<Box<dyn MessageCallback>> {
        let mut entry = self.take(id)?;
        debug!(
            id,
            kind = %entry.kind,
            elapsed = ?entry.registered_at.elapsed(),
            "operation failed"
        );
        entry.sink.on_failure();
        Ok(entry.sink)
    }

    /// Time out every operation whose deadline has passed.
    ///
    /// Sweeps deadlines in order, invokes `on_timeout` on each affected
    /// sink, and returns how many fired. Entries completed before their
    /// deadline are skipped; their stale deadline slots are discarded here
    /// rather than at completion time.
    pub fn expire(&mut self, now: Instant) -> usize {
        let mut expired = 0;

        while let Some(entry) = self.deadlines.first_entry() {
            if *entry.key() > now {
                break;
            }
            let ids = entry.remove();

            for id in ids {
                // Already completed ids are gone from the map; skip them.
                if let Some(mut entry) = self.entries.remove(&id) {
                    debug!(
                        id,
                        kind = %entry.kind,
                        topic = entry.sink.message().topic(),
                        "operation timed out"
                    );
                    entry.sink.on_timeout();
                    expired += 1;
                }
            }
        }

        if expired > 0 {
            warn!(expired, remaining = self.entries.len(), "timed out operations");
        }
        expired
    }

    /// The earliest deadline among pending operations.
    ///
    /// The owning loop sleeps until this instant before the next `expire`
    /// sweep. May report the deadline of an already-completed operation
    /// (stale slots are cleaned lazily by `expire`), which only causes a
    /// harmless early wake-up.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines
            .first_key_value()
            .map(|(&deadline, _)| deadline)
    }

    /// Fail every pending operation, exactly once each.
    ///
    /// Used when the owning connection is lost or the dispatcher shuts
    /// down: each remaining sink receives `on_failure`, honoring the
    /// one-terminal-notification contract for abandoned operations.
    /// Returns how many were failed.
    pub fn fail_all(&mut self) -> usize {
        let entries = std::mem::take(&mut self.entries);
        self.deadlines.clear();

        let failed = entries.len();
        for (_, mut entry) in entries {
            entry.sink.on_failure();
        }

        if failed > 0 {
            warn!(failed, "failed all pending operations");
        }
        failed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn take(&mut self, id: u64) -> DeviceClientResult<PendingEntry> {
        // Deadline slots for completed entries are cleaned lazily in expire.
        self.entries
            .remove(&id)
            .ok_or(DeviceClientError::UnknownOperation { id })
    }
}

impl fmt::Debug for PendingOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperations")
            .field("pending", &self.entries.len())
            .field("max_pending", &self.max_pending)
            .field("next_id", &self.next_id)
            .finish()
    }
}
