pub(crate) const DEFAULT_PAGE_LIMIT: usize = 50;
pub(crate) const MAX_PAGE_LIMIT: usize = 200;

pub(crate) const STREAM_CONNECT_TIMEOUT_SECS: u64 = 10;
pub(crate) const STREAM_KEEPALIVE_INTERVAL_SECS: u64 = 30;
pub(crate) const STREAM_RECONNECT_DELAY_SECS: u64 = 3;

pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 15;

pub(crate) const ERROR_BODY_MAX_CHARS: usize = 200;
#[cfg(target_os = "macos")]
pub(crate) const NOTIFICATION_BODY_MAX_CHARS: usize = 220;

pub(crate) const UNREAD_BADGE_CEILING: usize = 99;
