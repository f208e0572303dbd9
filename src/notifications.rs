use crate::model::Notification;

#[cfg(target_os = "macos")]
use crate::{consts::NOTIFICATION_BODY_MAX_CHARS, core::truncate_message};

/// Raise an OS-level banner for a freshly pushed notification.
///
/// Invoked only for arrivals the store accepted as new. Display failure is
/// logged and swallowed — the reconciliation store has already been updated
/// and must not be affected.
pub(crate) fn maybe_notify(enabled: bool, notification: &Notification) {
    if !enabled {
        return;
    }

    #[cfg(target_os = "macos")]
    send_macos_notification(notification.clone());
    #[cfg(not(target_os = "macos"))]
    log::debug!(
        "os notification suppressed (unsupported platform): id={}",
        notification.id
    );
}

#[cfg(target_os = "macos")]
pub(crate) fn send_macos_notification(notification: Notification) {
    use mac_notification_sys::Notification as OsNotification;

    std::thread::spawn(move || {
        let title = if notification.title.trim().is_empty() {
            notification.kind.clone()
        } else {
            notification.title.clone()
        };
        let body = truncate_message(&notification.message, NOTIFICATION_BODY_MAX_CHARS);

        let mut banner = OsNotification::new();
        banner
            .title(&title)
            .message(&body)
            .default_sound()
            .asynchronous(true);

        if let Err(error) = banner.send() {
            log::warn!("failed to show macOS notification: {error}");
        }
    });
}
