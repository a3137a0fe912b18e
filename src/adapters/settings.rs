//! Sync-service credentials, loaded once at startup.
//!
//! A small JSON file on the data partition supplies the API base URL and
//! key.  A missing or malformed file is fatal: without credentials the
//! controller cannot establish authoritative state and must not run a
//! fire unsupervised.

use serde::Deserialize;

use crate::error::Error;

/// Default location on the mounted data partition.
pub const DEFAULT_SETTINGS_PATH: &str = "/spiffs/sync.json";

/// Username the firmware authenticates as.
pub const SYNC_USERNAME: &str = "firmware";

/// Contents of the settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    /// Base URL of the sync service (the `/api` prefix is appended).
    #[serde(rename = "api-url")]
    pub api_url: String,
    /// Basic-auth password for the `firmware` user.
    #[serde(rename = "api-key")]
    pub api_key: String,
}

impl SyncSettings {
    /// Load and validate the settings file.
    pub fn load(path: &str) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)
            .map_err(|_| Error::Settings("settings file unreadable"))?;
        let mut settings: Self = serde_json::from_str(&raw)
            .map_err(|_| Error::Settings("settings file malformed"))?;
        settings.api_url = settings.api_url.trim().trim_end_matches('/').to_string();
        settings.api_key = settings.api_key.trim().to_string();
        if settings.api_url.is_empty() || settings.api_key.is_empty() {
            return Err(Error::Settings("settings file missing api-url or api-key"));
        }
        Ok(settings)
    }

    /// Root for API routes.
    pub fn api_root(&self) -> String {
        format!("{}/api", self.api_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn loads_and_trims() {
        let path = write_temp(
            "emberpit-sync-ok.json",
            r#"{"api-url": "https://vapor.example.com/", "api-key": "hunter2\n"}"#,
        );
        let settings = SyncSettings::load(&path).unwrap();
        assert_eq!(settings.api_root(), "https://vapor.example.com/api");
        assert_eq!(settings.api_key, "hunter2");
    }

    #[test]
    fn malformed_file_is_fatal() {
        let path = write_temp("emberpit-sync-bad.json", "api-url: not json");
        let err = SyncSettings::load(&path).unwrap_err();
        assert!(matches!(err, Error::Settings(_)));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = SyncSettings::load("/nonexistent/sync.json").unwrap_err();
        assert!(matches!(err, Error::Settings(_)));
    }
}
