//! Real-time notification client for the Gestionale server.
//!
//! One authenticated session owns one [`NotificationSession`]: a WebSocket
//! connection to the server's push endpoint with fixed-delay reconnection
//! and periodic keepalive probes, a REST client for snapshots and mutations,
//! and a [`NotificationStore`] that reconciles both sources into a single
//! consistent view (de-duplicated by id, unread count derived). Push frames
//! may raise an OS banner as a side effect; the list is optionally mirrored
//! to disk for offline display.

mod api;
mod badge;
mod consts;
mod core;
mod diagnostics;
mod error;
mod mirror;
mod model;
mod notifications;
mod settings;
mod store;
mod stream;

use std::{path::PathBuf, sync::Arc};

pub use api::{NotificationApi, NotificationBackend, SnapshotQuery};
pub use badge::badge_label;
pub use diagnostics::RuntimeDiagnostics;
pub use error::{Error, Result};
pub use model::{ConnectionState, Notification, StoreView};
pub use settings::{normalize_base_url, read_settings, save_settings, ClientSettings};
pub use store::NotificationStore;
pub use stream::{StreamSupervisor, StreamTuning};

/// Session-scoped owner of the whole subsystem. Construct one per
/// authenticated session and pass it explicitly to whoever needs it — there
/// is deliberately no global instance.
pub struct NotificationSession {
    store: Arc<NotificationStore>,
    stream: Arc<StreamSupervisor>,
}

impl NotificationSession {
    /// Build the REST client, the reconciliation store (preloading the
    /// mirror when a path is given) and the stream supervisor, then open the
    /// push connection. Fails with an auth error when no token is available.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(settings: &ClientSettings, mirror_path: Option<PathBuf>) -> Result<Self> {
        let token = settings
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(Error::MissingToken)?;

        let base_url = normalize_base_url(&settings.base_url)?;
        let api = NotificationApi::new(&base_url, &token)?;
        let store = Arc::new(NotificationStore::new(Arc::new(api), mirror_path));
        let stream = Arc::new(StreamSupervisor::new(
            store.clone(),
            base_url,
            settings.notifications_enabled,
            StreamTuning::default(),
        ));
        stream.start(Some(token))?;

        Ok(Self { store, stream })
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    pub fn stream(&self) -> &Arc<StreamSupervisor> {
        &self.stream
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.stream.connection_state()
    }

    /// Intentional teardown: closes the push connection and suppresses any
    /// pending reconnection. The store stays readable afterwards.
    pub fn close(&self) {
        self.stream.stop();
    }
}
