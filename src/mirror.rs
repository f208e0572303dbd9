use std::{
    fs,
    path::{Path, PathBuf},
    thread,
};

use crate::{
    core::{restrict_file_permissions, unique_time_suffix},
    error::{Error, Result},
    model::Notification,
};

/// Persisted mirror of the notification list, keyed by id, used only to
/// support offline listing. Never authoritative while a live session is
/// reconciling against the server.

pub(crate) fn load_notifications(path: &Path) -> Result<Vec<Notification>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)
        .map_err(|error| Error::Storage(format!("failed to read notification mirror: {error}")))?;
    match serde_json::from_str::<Vec<Notification>>(&content) {
        Ok(rows) => Ok(rows),
        Err(error) => {
            let backup_path = path.with_extension(format!("corrupt-{}.json", unique_time_suffix()));
            if let Err(rename_error) = fs::rename(path, &backup_path) {
                log::warn!("failed to back up corrupt mirror file: {rename_error}");
            } else {
                log::warn!("moved corrupt mirror file to {}", backup_path.display());
            }
            log::warn!("mirror parse failed, starting fresh: {error}");
            Ok(Vec::new())
        }
    }
}

pub(crate) fn persist_notifications(path: &Path, rows: &[Notification]) -> Result<()> {
    let content = serde_json::to_string(rows).map_err(|error| {
        Error::Storage(format!("failed to serialize notification mirror: {error}"))
    })?;
    let tmp_path = path.with_extension(format!("tmp-{}", unique_time_suffix()));
    fs::write(&tmp_path, content).map_err(|error| {
        Error::Storage(format!("failed to write notification mirror temp file: {error}"))
    })?;
    restrict_file_permissions(&tmp_path);
    fs::rename(&tmp_path, path).map_err(|error| {
        Error::Storage(format!("failed to atomically replace notification mirror: {error}"))
    })
}

/// Fire-and-forget persist, kept off the store's critical section.
pub(crate) fn persist_notifications_async(path: PathBuf, rows: Vec<Notification>) {
    thread::spawn(move || {
        if let Err(error) = persist_notifications(&path, &rows) {
            log::warn!("failed to persist notification mirror: {error}");
        }
    });
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn row(id: i64) -> Notification {
        Notification {
            id,
            kind: "expense".to_string(),
            title: "t".to_string(),
            message: "m".to_string(),
            is_read: false,
            user_id: 1,
            created_at: Utc::now(),
            updated_at: None,
            reference_id: None,
            reference_type: None,
            metadata: None,
        }
    }

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "gestionale-notify-mirror-{tag}-{}.json",
            std::process::id()
        ))
    }

    #[test]
    fn missing_file_loads_empty() {
        let rows = load_notifications(Path::new("/no/such/mirror.json")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn roundtrip_preserves_rows() {
        let path = temp_path("roundtrip");
        persist_notifications(&path, &[row(1), row(2)]).unwrap();
        let rows = load_notifications(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let path = temp_path("garbled");
        fs::write(&path, "not json at all").unwrap();

        let rows = load_notifications(&path).unwrap();
        assert!(rows.is_empty());
        // original was renamed aside, so a reload starts clean
        assert!(!path.exists());

        let dir = path.parent().unwrap();
        let stem = path.file_stem().unwrap().to_string_lossy().to_string();
        let mut backups = Vec::new();
        for entry in fs::read_dir(dir).unwrap().flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&stem) && name.contains(".corrupt-") {
                backups.push(entry.path());
            }
        }
        assert!(!backups.is_empty());
        for backup in backups {
            let _ = fs::remove_file(backup);
        }
    }
}
