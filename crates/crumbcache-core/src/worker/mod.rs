//! Worker module: the offline cache manager and its lifecycle.
//!
//! This module provides:
//! - `OfflineCacheManager`: install, activate, fetch, message, push,
//!   notification click and sync handlers
//! - `WorkerEvent` / `dispatch`: one awaited handler per host event
//! - `Lifecycle`: the forward-only worker state machine
//! - `Host`: what the worker asks of the platform
//! - `Registration`: the host's record of active and waiting versions
//! - `RecordingHost` (tests and the `test-util` feature): a `Host` that records calls

pub mod dispatch;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod manager;
pub mod message;
pub mod notification;
#[cfg(any(test, feature = "test-util"))]
pub mod recording;
pub mod registration;

pub use dispatch::{EventKind, EventReply, WorkerEvent};
pub use error::{WorkerError, WorkerResult};
pub use host::Host;
pub use lifecycle::{Lifecycle, WorkerState};
pub use manager::{ActivationReport, ClickOutcome, FetchOutcome, OfflineCacheManager, ResponseSource, SyncOutcome};
pub use message::ClientMessage;
pub use notification::{Notification, NotificationAction, NotificationClick, NotificationData, WindowClient};
pub use registration::{Registration, RegistrationData, VersionRecord};

#[cfg(any(test, feature = "test-util"))]
pub use recording::{HostEvent, RecordingHost};
