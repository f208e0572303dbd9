use serde::Serialize;

use crate::{core::unix_now_secs, model::ConnectionState, stream::RuntimeState};

/// Point-in-time snapshot of the stream runtime, for the ambient connection
/// indicator and debugging.
#[derive(Debug, Serialize, Clone)]
pub struct RuntimeDiagnostics {
    pub connection_state: ConnectionState,
    pub should_run: bool,
    pub last_connected_at: Option<u64>,
    pub last_event_at: Option<u64>,
    pub last_notification_at: Option<u64>,
    pub last_notification_id: Option<i64>,
    pub stale_for_seconds: Option<u64>,
    pub last_error: Option<String>,
    pub reconnect_attempts: u64,
}

pub(crate) fn snapshot(state: ConnectionState, runtime: &RuntimeState) -> RuntimeDiagnostics {
    let now = unix_now_secs();
    let stale_for_seconds = runtime.last_event_at.map(|last| now.saturating_sub(last));

    RuntimeDiagnostics {
        connection_state: state,
        should_run: runtime.should_run,
        last_connected_at: runtime.last_connected_at,
        last_event_at: runtime.last_event_at,
        last_notification_at: runtime.last_notification_at,
        last_notification_id: runtime.last_notification_id,
        stale_for_seconds,
        last_error: runtime.last_error.clone(),
        reconnect_attempts: runtime.reconnect_attempts,
    }
}
