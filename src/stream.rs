use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::{
    consts::{
        STREAM_CONNECT_TIMEOUT_SECS, STREAM_KEEPALIVE_INTERVAL_SECS, STREAM_RECONNECT_DELAY_SECS,
    },
    core::{redact_ws_url, truncate_message, unix_now_secs},
    diagnostics::{self, RuntimeDiagnostics},
    error::{Error, Result},
    model::{ConnectionState, Notification, StreamEvent, StreamFrameWire},
    notifications,
    settings::build_notifications_ws_url,
    store::NotificationStore,
};

/// Timing knobs for the stream supervisor. Defaults match production; tests
/// shrink them.
#[derive(Debug, Clone, Copy)]
pub struct StreamTuning {
    pub connect_timeout: Duration,
    pub keepalive_interval: Duration,
    pub reconnect_delay: Duration,
}

impl Default for StreamTuning {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(STREAM_CONNECT_TIMEOUT_SECS),
            keepalive_interval: Duration::from_secs(STREAM_KEEPALIVE_INTERVAL_SECS),
            reconnect_delay: Duration::from_secs(STREAM_RECONNECT_DELAY_SECS),
        }
    }
}

#[derive(Default)]
pub(crate) struct RuntimeState {
    pub(crate) stop_tx: Option<watch::Sender<bool>>,
    pub(crate) stream_epoch: u64,
    pub(crate) should_run: bool,
    pub(crate) last_connected_at: Option<u64>,
    pub(crate) last_event_at: Option<u64>,
    pub(crate) last_notification_at: Option<u64>,
    pub(crate) last_notification_id: Option<i64>,
    pub(crate) last_error: Option<String>,
    pub(crate) reconnect_attempts: u64,
}

/// Owns the single live push connection for a session: connect lifecycle,
/// fixed-delay reconnection, keepalive probes and frame dispatch into the
/// reconciliation store.
pub struct StreamSupervisor {
    store: Arc<NotificationStore>,
    base_url: String,
    notifications_enabled: bool,
    tuning: StreamTuning,
    token: Mutex<Option<String>>,
    runtime: Mutex<RuntimeState>,
    state_tx: watch::Sender<ConnectionState>,
}

impl StreamSupervisor {
    /// `base_url` must already be normalized (http/https, no trailing `/`).
    pub fn new(
        store: Arc<NotificationStore>,
        base_url: String,
        notifications_enabled: bool,
        tuning: StreamTuning,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            store,
            base_url,
            notifications_enabled,
            tuning,
            token: Mutex::new(None),
            runtime: Mutex::new(RuntimeState::default()),
            state_tx,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn diagnostics(&self) -> Result<RuntimeDiagnostics> {
        let runtime = self
            .runtime
            .lock()
            .map_err(|_| Error::Internal("runtime lock poisoned".to_string()))?;
        Ok(diagnostics::snapshot(self.connection_state(), &runtime))
    }

    /// Replace the session token. Clearing it makes the next reconnection
    /// attempt skip silently and end the retry loop (forced-logout flows).
    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = token.filter(|t| !t.trim().is_empty());
        }
    }

    fn current_token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|guard| guard.clone())
    }

    /// Open the push connection. A no-op while a connection is already
    /// current (Connecting or Connected). With no token available no
    /// connection attempt is made and the state goes to Errored.
    ///
    /// Must be called from within a tokio runtime: the stream task is
    /// spawned onto it.
    pub fn start(self: &Arc<Self>, token_override: Option<String>) -> Result<()> {
        if let Some(token) = token_override {
            if !token.trim().is_empty() {
                self.set_token(Some(token));
            }
        }

        let stop_rx;
        let task_epoch;
        {
            let mut runtime = self
                .runtime
                .lock()
                .map_err(|_| Error::Internal("runtime lock poisoned".to_string()))?;
            if runtime.stop_tx.is_some() {
                return Ok(());
            }

            if self.current_token().is_none() {
                runtime.last_error = Some("no token available".to_string());
                drop(runtime);
                self.set_state(ConnectionState::Errored);
                return Err(Error::MissingToken);
            }

            let (tx, rx) = watch::channel(false);
            runtime.stop_tx = Some(tx);
            runtime.stream_epoch = runtime.stream_epoch.wrapping_add(1);
            task_epoch = runtime.stream_epoch;
            runtime.should_run = true;
            runtime.last_error = None;
            runtime.reconnect_attempts = 0;
            stop_rx = rx;
        }

        self.set_state(ConnectionState::Connecting);
        log::debug!("spawning stream task");
        let supervisor = self.clone();
        tokio::spawn(async move {
            supervisor.run_stream_loop(stop_rx, task_epoch).await;
        });
        Ok(())
    }

    /// Intentional disconnect. Idempotent: always drives the state to
    /// Disconnected regardless of the current one. The stop signal sent here
    /// cancels the keepalive interval and any pending reconnection sleep
    /// before they can act — every await point in the stream task selects
    /// against it.
    pub fn stop(&self) {
        if let Ok(mut runtime) = self.runtime.lock() {
            if let Some(stop_tx) = runtime.stop_tx.take() {
                let _ = stop_tx.send(true);
            }
            runtime.should_run = false;
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    async fn run_stream_loop(
        self: Arc<Self>,
        mut stop_rx: watch::Receiver<bool>,
        task_epoch: u64,
    ) {
        log::debug!("stream task started");

        loop {
            if *stop_rx.borrow() {
                break;
            }
            // the token can be invalidated between attempts; skip silently
            // and stop rescheduling until an external start()
            let Some(token) = self.current_token() else {
                log::debug!("connection attempt skipped: no token");
                break;
            };

            self.set_state(ConnectionState::Connecting);
            log::debug!("attempting stream connection");
            match self.stream_once(&token, &mut stop_rx).await {
                Ok(()) => break, // only returned once a stop was observed
                Err(error) => {
                    if *stop_rx.borrow() {
                        break;
                    }

                    log::warn!("stream error: {error}");
                    self.set_state(ConnectionState::Errored);
                    if let Ok(mut runtime) = self.runtime.lock() {
                        runtime.last_error = Some(truncate_message(&error, 300));
                        runtime.reconnect_attempts = runtime.reconnect_attempts.saturating_add(1);
                    }

                    // exactly one pending reconnection timer at a time; a
                    // stop during the delay window cancels it
                    tokio::select! {
                        _ = stop_rx.changed() => {
                            if *stop_rx.borrow() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(self.tuning.reconnect_delay) => {}
                    }
                }
            }
        }

        if let Ok(mut runtime) = self.runtime.lock() {
            if runtime.stream_epoch != task_epoch {
                return; // a newer stream task owns the state now
            }
            runtime.stop_tx = None;
            runtime.should_run = false;
        }
        self.set_state(ConnectionState::Disconnected);
    }

    async fn stream_once(
        &self,
        token: &str,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> std::result::Result<(), String> {
        let ws_url = build_notifications_ws_url(&self.base_url, token)
            .map_err(|error| format!("failed to build websocket URL: {error}"))?;
        log::debug!("ws connect {}", redact_ws_url(&ws_url));

        let (mut ws_stream, _) = tokio::time::timeout(
            self.tuning.connect_timeout,
            connect_async(ws_url.as_str()),
        )
        .await
        .map_err(|_| {
            format!(
                "stream connection timed out after {} seconds",
                self.tuning.connect_timeout.as_secs()
            )
        })?
        .map_err(|error| format!("stream connection failed: {error}"))?;

        log::debug!("ws connected");
        let now = unix_now_secs();
        if let Ok(mut runtime) = self.runtime.lock() {
            runtime.last_connected_at = Some(now);
            runtime.last_event_at = Some(now);
            runtime.last_error = None;
        }
        self.set_state(ConnectionState::Connected);

        // the keepalive interval lives inside this session scope, so it is
        // torn down with the socket whenever the state leaves Connected
        let mut keepalive = tokio::time::interval(self.tuning.keepalive_interval);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        keepalive.tick().await;

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        let _ = ws_stream.close(None).await;
                        return Ok(());
                    }
                }
                incoming = ws_stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            self.mark_stream_activity();
                            log::debug!("ws text frame bytes={}", text.len());
                            match decode_frame(text.as_ref()) {
                                Some(StreamEvent::Notification(notification)) => {
                                    self.handle_notification(notification).await;
                                }
                                Some(StreamEvent::Pong) => {
                                    log::debug!("keepalive ack received");
                                }
                                None => {}
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            self.mark_stream_activity();
                            ws_stream.send(Message::Pong(payload)).await
                                .map_err(|error| format!("failed to send pong: {error}"))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.mark_stream_activity();
                        }
                        Some(Ok(Message::Close(_))) => {
                            return Err("stream closed by server".to_string());
                        }
                        Some(Ok(_)) => {
                            self.mark_stream_activity();
                        }
                        Some(Err(error)) => return Err(format!("stream read error: {error}")),
                        None => return Err("stream ended unexpectedly".to_string()),
                    }
                }
                _ = keepalive.tick() => {
                    log::debug!("keepalive ping sent");
                    ws_stream.send(Message::Text("ping".into())).await
                        .map_err(|error| format!("failed to send keepalive ping: {error}"))?;
                }
            }
        }
    }

    async fn handle_notification(&self, notification: Notification) {
        if let Ok(mut runtime) = self.runtime.lock() {
            runtime.last_notification_at = Some(unix_now_secs());
            runtime.last_notification_id = Some(notification.id);
        }

        let fresh = self.store.apply_pushed(notification.clone()).await;
        if fresh {
            notifications::maybe_notify(self.notifications_enabled, &notification);
        }
    }

    fn mark_stream_activity(&self) {
        if let Ok(mut runtime) = self.runtime.lock() {
            runtime.last_event_at = Some(unix_now_secs());
        }
    }
}

/// Decode one inbound text frame into a typed event. Malformed frames are
/// logged and dropped; unknown discriminators are dropped silently so newer
/// servers can add frame types. Neither ever closes the connection.
pub(crate) fn decode_frame(text: &str) -> Option<StreamEvent> {
    let frame = match serde_json::from_str::<StreamFrameWire>(text) {
        Ok(frame) => frame,
        Err(error) => {
            log::warn!(
                "stream decode failed: {error} payload={}",
                truncate_message(text, 140)
            );
            return None;
        }
    };

    match frame.kind.as_str() {
        "notification" => match frame.notification {
            Some(notification) => Some(StreamEvent::Notification(notification)),
            None => {
                log::warn!("notification frame without payload");
                None
            }
        },
        "pong" => Some(StreamEvent::Pong),
        other => {
            log::debug!("ignoring unknown frame type {other:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_notification_envelope() {
        let raw = r#"{
            "type": "notification",
            "notification": {
                "id": 3,
                "type": "expense",
                "title": "Nuova spesa",
                "message": "Dinner added",
                "is_read": false,
                "user_id": 2,
                "created_at": "2024-05-01T10:30:00+00:00"
            }
        }"#;
        match decode_frame(raw) {
            Some(StreamEvent::Notification(n)) => {
                assert_eq!(n.id, 3);
                assert_eq!(n.kind, "expense");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_keepalive_ack() {
        assert!(matches!(
            decode_frame(r#"{"type": "pong"}"#),
            Some(StreamEvent::Pong)
        ));
    }

    #[test]
    fn malformed_frame_is_dropped() {
        assert!(decode_frame("not json").is_none());
        assert!(decode_frame(r#"{"no_type": true}"#).is_none());
    }

    #[test]
    fn unknown_discriminator_is_dropped() {
        assert!(decode_frame(r#"{"type": "presence", "user_id": 4}"#).is_none());
    }

    #[test]
    fn notification_frame_without_payload_is_dropped() {
        assert!(decode_frame(r#"{"type": "notification"}"#).is_none());
    }
}
