// SPDX-License-Identifier: MPL-2.0

//! Message/result core of an MQTT IoT device client.
//!
//! The central type is [`device_client::Message`]: one envelope that
//! carries topic, QoS, and payload for an MQTT-level operation and doubles
//! as the callback sink for its outcome. The
//! [`device_client::MessageCallback`] trait defines the three terminal
//! notifications (success, failure, timeout), each a no-op unless
//! overridden, and the dispatchers deliver exactly one of them per
//! registered operation on a worker thread or tokio task.
//!
//! The MQTT transport itself (connect, TLS, keep-alive, the wire codec)
//! lives outside this crate and interacts with it only by constructing
//! messages, registering sinks, and completing operations.

pub mod device_client;

pub use device_client::{
    CompletionDispatcher, DeviceClientError, DeviceClientResult, DeviceErrorCode, DispatcherConfig,
    Message, MessageCallback, OperationKind, PendingOperations, Qos, TokioCompletionDispatcher,
};
