use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{
    core::restrict_file_permissions,
    error::{Error, Result},
};

/// Client-side configuration for one authenticated session. The token is
/// assumed to have been obtained elsewhere (login flow); this subsystem only
/// consumes it.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub notifications_enabled: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            notifications_enabled: true,
        }
    }
}

impl ClientSettings {
    pub fn has_token(&self) -> bool {
        self.token.as_deref().map_or(false, |t| !t.trim().is_empty())
    }
}

pub fn read_settings(path: &Path) -> Result<ClientSettings> {
    if !path.exists() {
        return Ok(ClientSettings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|error| Error::Storage(format!("failed to read settings: {error}")))?;
    serde_json::from_str::<ClientSettings>(&content)
        .map_err(|error| Error::Storage(format!("failed to parse settings: {error}")))
}

pub fn save_settings(path: &Path, settings: &ClientSettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)
        .map_err(|error| Error::Storage(format!("failed to serialize settings: {error}")))?;
    fs::write(path, content)
        .map_err(|error| Error::Storage(format!("failed to write settings: {error}")))?;
    restrict_file_permissions(path);
    Ok(())
}

pub fn normalize_base_url(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("server URL is required".to_string()));
    }

    let url = reqwest::Url::parse(trimmed)
        .map_err(|error| Error::InvalidUrl(error.to_string()))?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::InvalidUrl(
            "server URL must start with http:// or https://".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Socket URI for the push endpoint: `ws(s)://<host>/notifications/ws` with
/// the token carried as a query parameter, as the server expects.
pub(crate) fn build_notifications_ws_url(base_url: &str, token: &str) -> Result<String> {
    let mut ws_url = reqwest::Url::parse(base_url)
        .map_err(|error| Error::InvalidUrl(error.to_string()))?;

    match ws_url.scheme() {
        "http" => {
            ws_url
                .set_scheme("ws")
                .map_err(|_| Error::InvalidUrl("unable to convert URL scheme to ws".to_string()))?;
        }
        "https" => {
            ws_url.set_scheme("wss").map_err(|_| {
                Error::InvalidUrl("unable to convert URL scheme to wss".to_string())
            })?;
        }
        _ => {
            return Err(Error::InvalidUrl(
                "server URL must start with http:// or https://".to_string(),
            ))
        }
    }

    let mut path = ws_url.path().trim_end_matches('/').to_string();
    path.push_str("/notifications/ws");
    ws_url.set_path(&path);
    ws_url.query_pairs_mut().append_pair("token", token);
    Ok(ws_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://example.com/api/").unwrap(),
            "https://example.com/api"
        );
    }

    #[test]
    fn normalize_rejects_empty_and_bad_scheme() {
        assert!(matches!(normalize_base_url("  "), Err(Error::InvalidUrl(_))));
        assert!(matches!(
            normalize_base_url("ftp://example.com"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn ws_url_swaps_scheme_and_appends_path() {
        let url = build_notifications_ws_url("http://example.com", "abc").unwrap();
        assert_eq!(url, "ws://example.com/notifications/ws?token=abc");

        let url = build_notifications_ws_url("https://example.com/api", "abc").unwrap();
        assert_eq!(url, "wss://example.com/api/notifications/ws?token=abc");
    }

    #[test]
    fn ws_url_encodes_token() {
        let url = build_notifications_ws_url("http://example.com", "a b+c").unwrap();
        assert!(!url.contains("a b"));
        assert!(url.contains("token=a+b%2Bc"));
    }

    #[test]
    fn settings_default_when_file_missing() {
        let path = std::env::temp_dir().join("gestionale-notify-no-such-settings.json");
        let settings = read_settings(&path).unwrap();
        assert!(settings.base_url.is_empty());
        assert!(!settings.has_token());
        assert!(settings.notifications_enabled);
    }

    #[test]
    fn settings_roundtrip() {
        let path = std::env::temp_dir().join(format!(
            "gestionale-notify-settings-{}.json",
            std::process::id()
        ));
        let settings = ClientSettings {
            base_url: "https://example.com".to_string(),
            token: Some("tok".to_string()),
            notifications_enabled: false,
        };
        save_settings(&path, &settings).unwrap();
        let loaded = read_settings(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.base_url, "https://example.com");
        assert!(loaded.has_token());
        assert!(!loaded.notifications_enabled);
    }
}
