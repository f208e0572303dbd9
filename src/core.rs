use std::{
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

/// Monotonic counter for generating unique temp/backup file suffixes.
static FILE_SUFFIX_COUNTER: AtomicU64 = AtomicU64::new(0);

pub(crate) fn truncate_message(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }

    let truncated: String = input.chars().take(max_chars).collect();
    format!("{truncated}...")
}

pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub(crate) fn unique_time_suffix() -> u64 {
    FILE_SUFFIX_COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn restrict_file_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;

        if path.exists() {
            if let Err(error) =
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            {
                log::warn!("restrict_file_permissions: failed for {path:?}: {error}");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

pub(crate) fn redact_ws_url(url: &str) -> String {
    let mut parsed = match reqwest::Url::parse(url) {
        Ok(url) => url,
        Err(_) => return "<invalid-url>".to_string(),
    };
    if parsed.query().is_some() {
        parsed.set_query(Some("token=***"));
    }
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_input_alone() {
        assert_eq!(truncate_message("hello", 10), "hello");
    }

    #[test]
    fn truncate_appends_ellipsis() {
        assert_eq!(truncate_message("hello world", 5), "hello...");
    }

    #[test]
    fn redact_hides_token_query() {
        let redacted = redact_ws_url("ws://example.com/notifications/ws?token=sekrit");
        assert!(!redacted.contains("sekrit"));
        assert!(redacted.contains("token=***"));
    }

    #[test]
    fn redact_leaves_queryless_url_alone() {
        assert_eq!(
            redact_ws_url("wss://example.com/notifications/ws"),
            "wss://example.com/notifications/ws"
        );
    }
}
