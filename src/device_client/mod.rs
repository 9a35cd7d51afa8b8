// SPDX-License-Identifier: MPL-2.0

pub mod callback;
pub mod dispatcher;
pub mod error;
pub mod error_code;
pub mod message;
pub mod opts;
pub mod pending;
pub mod qos;
pub mod tokio_dispatcher;

pub use callback::MessageCallback;
pub use dispatcher::CompletionDispatcher;
pub use error::{DeviceClientError, DeviceClientResult};
pub use error_code::DeviceErrorCode;
pub use message::{Message, MessageBuilder, MessageBuilderError};
pub use opts::{DispatcherConfig, DispatcherConfigBuilder};
pub use pending::{OperationKind, PendingOperations};
pub use qos::Qos;
pub use tokio_dispatcher::TokioCompletionDispatcher;
