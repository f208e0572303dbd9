use std::{cmp::Ordering, path::PathBuf, sync::Arc};

use tokio::sync::{watch, Mutex};

use crate::{
    api::{NotificationBackend, SnapshotQuery},
    error::Result,
    mirror,
    model::{Notification, StoreView},
};

/// Newest first, id as tiebreak for identical timestamps.
pub(crate) fn notification_cmp(a: &Notification, b: &Notification) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

fn normalize(mut rows: Vec<Notification>) -> Vec<Notification> {
    rows.sort_by(notification_cmp);
    rows.dedup_by_key(|n| n.id);
    rows
}

/// Single source of UI truth for the notification list and unread counter.
///
/// Push-delivered events and REST snapshots both land here and are merged
/// into one consistent view, de-duplicated by id. Every mutation runs under
/// one async mutex held across the REST confirmation, so a snapshot replace
/// can never interleave with a push apply. Local state changes only after
/// the server confirms; on any REST failure the list is left exactly as it
/// was — the store is never ahead of the last confirmed server state.
///
/// The unread counter is derived from the stored entries on every mutation
/// rather than tracked independently, so the two can never diverge.
pub struct NotificationStore {
    backend: Arc<dyn NotificationBackend>,
    entries: Mutex<Vec<Notification>>,
    view_tx: watch::Sender<StoreView>,
    mirror_path: Option<PathBuf>,
}

impl NotificationStore {
    /// When `mirror_path` is given, previously mirrored notifications are
    /// preloaded for offline listing and every confirmed mutation is written
    /// back (off the critical path).
    pub fn new(backend: Arc<dyn NotificationBackend>, mirror_path: Option<PathBuf>) -> Self {
        let entries = match mirror_path.as_deref() {
            Some(path) => match mirror::load_notifications(path) {
                Ok(rows) => normalize(rows),
                Err(error) => {
                    log::warn!("failed to load notification mirror: {error}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let view = StoreView {
            unread: entries.iter().filter(|n| !n.is_read).count(),
            notifications: entries.clone(),
        };
        let (view_tx, _) = watch::channel(view);

        Self {
            backend,
            entries: Mutex::new(entries),
            view_tx,
            mirror_path,
        }
    }

    /// Latest published view. Use [`subscribe`](Self::subscribe) to observe
    /// changes.
    pub fn view(&self) -> StoreView {
        self.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreView> {
        self.view_tx.subscribe()
    }

    /// Count of unread entries, derived from the stored list.
    pub fn unread_count(&self) -> usize {
        self.view_tx.borrow().unread
    }

    fn publish(&self, entries: &[Notification]) {
        let view = StoreView {
            unread: entries.iter().filter(|n| !n.is_read).count(),
            notifications: entries.to_vec(),
        };
        self.view_tx.send_replace(view);

        if let Some(path) = &self.mirror_path {
            mirror::persist_notifications_async(path.clone(), entries.to_vec());
        }
    }

    /// Fetch a page from the REST collaborator and replace the working list
    /// with it. The snapshot is authoritative for the query it was fetched
    /// with, so this is a full replace, not a merge-by-id append.
    pub async fn load_snapshot(&self, query: SnapshotQuery) -> Result<StoreView> {
        let mut entries = self.entries.lock().await;
        let page = self.backend.fetch_page(query).await?;
        *entries = normalize(page);
        self.publish(&entries);
        Ok(self.view())
    }

    /// Merge one push-delivered notification. A duplicate id never inserts;
    /// a fresh arrival is stored unread regardless of the wire flag and
    /// prepended. Returns whether the notification was new.
    pub async fn apply_pushed(&self, mut notification: Notification) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|n| n.id == notification.id) {
            log::debug!("duplicate push suppressed: id={}", notification.id);
            return false;
        }

        notification.is_read = false;
        entries.insert(0, notification);
        self.publish(&entries);
        true
    }

    /// Flip one read flag, server first. A missing entry or an entry already
    /// in the requested state is a successful no-op with no REST call.
    pub async fn mark_read(&self, id: i64, read: bool) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let position = match entries.iter().position(|n| n.id == id && n.is_read != read) {
            Some(position) => position,
            None => return Ok(()),
        };

        let confirmed = self.backend.set_read(id, read).await?;
        entries[position].is_read = confirmed.is_read;
        entries[position].updated_at = confirmed.updated_at;
        self.publish(&entries);
        Ok(())
    }

    /// Bulk flip, server first. Local flags change only once the server has
    /// confirmed.
    pub async fn mark_all_read(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        self.backend.mark_all_read().await?;
        for entry in entries.iter_mut() {
            entry.is_read = true;
        }
        self.publish(&entries);
        Ok(())
    }

    /// Delete server-side, then drop the local entry on success.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut entries = self.entries.lock().await;
        self.backend.delete(id).await?;
        entries.retain(|n| n.id != id);
        self.publish(&entries);
        Ok(())
    }

    /// Server-side unread total, for the badge before the first snapshot is
    /// loaded. Never merged into the derived local count.
    pub async fn server_unread_count(&self) -> Result<u64> {
        self.backend.fetch_unread_count().await
    }
}
