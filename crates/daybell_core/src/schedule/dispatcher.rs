//! Notification dispatcher contract and an in-memory implementation.
//!
//! # Responsibility
//! - Describe the platform notification collaborator the scheduler talks to.
//! - Provide [`RecordingDispatcher`] for hosts without a native dispatcher,
//!   the CLI smoke check and tests.
//!
//! # Invariants
//! - `schedule` returning `Ok(None)` means notifications are disabled or
//!   denied; it is not an error.
//! - `cancel` is idempotent: unknown or consumed handles are a no-op.

use crate::model::entity::{EntityRef, NotificationHandle};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;
use uuid::Uuid;

pub type DispatchResult<T> = Result<T, DispatchError>;

/// One-shot notification request.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub entity: EntityRef,
    pub title: String,
    pub body: String,
    pub payload: Map<String, Value>,
    /// Unix epoch milliseconds.
    pub fire_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The user or platform denied notification permission.
    PermissionDenied,
    /// Notifications are not available on this platform right now.
    Unavailable(String),
    /// A cancellation could not be delivered.
    Cancel(String),
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "notification permission denied"),
            Self::Unavailable(reason) => write!(f, "notification dispatcher unavailable: {reason}"),
            Self::Cancel(reason) => write!(f, "notification cancel failed: {reason}"),
        }
    }
}

impl Error for DispatchError {}

pub trait NotificationDispatcher {
    /// Arms one notification and returns its handle, or `None` when
    /// notifications are turned off.
    ///
    /// Any error stops the caller from arming further notifications in the
    /// same pass; handles already returned stay armed.
    fn schedule(&self, request: &NotificationRequest) -> DispatchResult<Option<NotificationHandle>>;

    fn cancel(&self, handle: &NotificationHandle) -> DispatchResult<()>;
}

impl<T: NotificationDispatcher + ?Sized> NotificationDispatcher for &T {
    fn schedule(&self, request: &NotificationRequest) -> DispatchResult<Option<NotificationHandle>> {
        (**self).schedule(request)
    }

    fn cancel(&self, handle: &NotificationHandle) -> DispatchResult<()> {
        (**self).cancel(handle)
    }
}

/// Notification armed in a [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PendingNotification {
    pub handle: NotificationHandle,
    pub request: NotificationRequest,
}

#[derive(Debug, Default)]
struct RecordingState {
    pending: Vec<PendingNotification>,
    cancelled: Vec<NotificationHandle>,
}

/// In-memory dispatcher that records requests instead of posting them.
///
/// Handles are random UUIDs, unique across instances and processes that
/// share one database.
#[derive(Debug)]
pub struct RecordingDispatcher {
    notifications_enabled: bool,
    state: Mutex<RecordingState>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self {
            notifications_enabled: true,
            state: Mutex::default(),
        }
    }

    /// Dispatcher that behaves like a device with notifications turned off.
    pub fn notifications_disabled() -> Self {
        Self {
            notifications_enabled: false,
            state: Mutex::default(),
        }
    }

    /// Notifications armed and not cancelled, in scheduling order.
    pub fn pending(&self) -> Vec<PendingNotification> {
        self.with_state(|state| state.pending.clone())
            .unwrap_or_default()
    }

    /// Every handle passed to `cancel`, including unknown ones.
    pub fn cancelled(&self) -> Vec<NotificationHandle> {
        self.with_state(|state| state.cancelled.clone())
            .unwrap_or_default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RecordingState) -> T) -> DispatchResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DispatchError::Unavailable("recording state poisoned".to_string()))?;
        Ok(f(&mut state))
    }
}

impl Default for RecordingDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn schedule(&self, request: &NotificationRequest) -> DispatchResult<Option<NotificationHandle>> {
        if !self.notifications_enabled {
            return Ok(None);
        }
        self.with_state(|state| {
            let handle = NotificationHandle::new(Uuid::new_v4().to_string());
            state.pending.push(PendingNotification {
                handle: handle.clone(),
                request: request.clone(),
            });
            Some(handle)
        })
    }

    fn cancel(&self, handle: &NotificationHandle) -> DispatchResult<()> {
        self.with_state(|state| {
            state.pending.retain(|pending| &pending.handle != handle);
            state.cancelled.push(handle.clone());
        })
    }
}
