//! ESP-IDF HTTP sync adapter.
//!
//! Implements [`SyncPort`] over `EspHttpConnection`.  Every request:
//!
//! - authenticates with HTTP Basic auth (`firmware` + the configured key),
//! - carries the `Firmware-Version` header,
//! - is bounded by an explicit timeout, so a hung remote stalls the
//!   control loop for at most [`SYNC_TIMEOUT_SECS`] seconds instead of
//!   suspending safety checks indefinitely.
//!
//! A fresh connection is built per request; the exchange cadence (10 s
//! heartbeat) makes connection reuse not worth the lifetime juggling.

use std::time::Duration;

use base64::Engine as _;
use embedded_svc::http::client::Client as HttpClient;
use embedded_svc::http::{Method, Status};
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::client::{Configuration as HttpClientConfiguration, EspHttpConnection};
use log::{error, info};

use super::{state_body_stripped, HeartbeatReply, ProgramDoc};
use crate::adapters::settings::{SyncSettings, SYNC_USERNAME};
use crate::app::ports::SyncPort;
use crate::error::SyncError;
use crate::fsm::context::ControlState;
use crate::program::ProgramStep;

/// Hard bound on any single sync exchange.
const SYNC_TIMEOUT_SECS: u64 = 5;

const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn is_ok(status: u16) -> bool {
    (200..300).contains(&status)
}

/// [`SyncPort`] adapter speaking JSON over HTTPS.
pub struct EspSyncClient {
    api_root: String,
    auth_header: String,
}

impl EspSyncClient {
    pub fn new(settings: &SyncSettings) -> Self {
        let credentials = format!("{}:{}", SYNC_USERNAME, settings.api_key);
        let auth_header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );
        Self {
            api_root: settings.api_root(),
            auth_header,
        }
    }

    /// One bounded request/response exchange.  Transport-level failure maps
    /// to `SyncError`; the status code is returned for in-band handling.
    fn send(
        &self,
        method: Method,
        route: &str,
        body: Option<&serde_json::Value>,
        op: &'static str,
    ) -> Result<(u16, Vec<u8>), SyncError> {
        let fail = |detail: &str| {
            error!("{op}: {detail}");
            SyncError::new(op)
        };

        let config = HttpClientConfiguration {
            timeout: Some(Duration::from_secs(SYNC_TIMEOUT_SECS)),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let connection =
            EspHttpConnection::new(&config).map_err(|e| fail(&format!("connect: {e:?}")))?;
        let mut client = HttpClient::wrap(connection);

        let url = format!("{}{}", self.api_root, route);
        let payload = match body {
            Some(value) => {
                Some(serde_json::to_vec(value).map_err(|e| fail(&format!("encode: {e}")))?)
            }
            None => None,
        };
        let content_length = payload.as_ref().map(|p| p.len().to_string());

        let mut headers: Vec<(&str, &str)> = vec![
            ("Authorization", self.auth_header.as_str()),
            ("Firmware-Version", FIRMWARE_VERSION),
        ];
        if let Some(len) = content_length.as_deref() {
            headers.push(("Content-Type", "application/json"));
            headers.push(("Content-Length", len));
        }

        let mut request = client
            .request(method, &url, &headers)
            .map_err(|e| fail(&format!("request: {e:?}")))?;
        if let Some(payload) = payload.as_deref() {
            request
                .write_all(payload)
                .map_err(|e| fail(&format!("write: {e:?}")))?;
        }
        let mut response = request
            .submit()
            .map_err(|e| fail(&format!("submit: {e:?}")))?;

        let status = response.status();
        let mut bytes = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            let n = response
                .read(&mut chunk)
                .map_err(|e| fail(&format!("read: {e:?}")))?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
        }
        Ok((status, bytes))
    }
}

impl SyncPort for EspSyncClient {
    fn post_boot(&mut self, state: &ControlState) -> Result<bool, SyncError> {
        let body = state_body_stripped(state);
        info!("POST /smoker/boot: {body}");
        let (status, _) = self.send(Method::Post, "/smoker/boot", Some(&body), "boot")?;
        Ok(is_ok(status))
    }

    fn post_heartbeat(
        &mut self,
        state: &ControlState,
    ) -> Result<Option<HeartbeatReply>, SyncError> {
        let body = state_body_stripped(state);
        let (status, bytes) =
            self.send(Method::Post, "/smoker/heartbeat", Some(&body), "heartbeat")?;
        if !is_ok(status) {
            error!("heartbeat: sync service answered {status}");
            return Ok(None);
        }
        let reply = serde_json::from_slice(&bytes).map_err(|e| {
            error!("heartbeat: malformed reply: {e}");
            SyncError::new("heartbeat")
        })?;
        Ok(Some(reply))
    }

    fn put_state(&mut self, state: &ControlState) -> Result<bool, SyncError> {
        let body = serde_json::to_value(state).map_err(|e| {
            error!("put-state: encode: {e}");
            SyncError::new("put-state")
        })?;
        let (status, _) = self.send(Method::Put, "/state", Some(&body), "put-state")?;
        Ok(is_ok(status))
    }

    fn patch_state(&mut self, patch: &serde_json::Value) -> Result<bool, SyncError> {
        info!("PATCH /state: {patch}");
        let (status, _) = self.send(Method::Patch, "/state", Some(patch), "patch-state")?;
        Ok(is_ok(status))
    }

    fn fetch_program_id(&mut self) -> Result<Option<String>, SyncError> {
        let (status, bytes) = self.send(Method::Get, "/program", None, "fetch-program-id")?;
        if !is_ok(status) {
            return Ok(None);
        }
        let id = String::from_utf8_lossy(&bytes)
            .trim()
            .trim_matches('"')
            .to_string();
        Ok((!id.is_empty()).then_some(id))
    }

    fn fetch_program(&mut self, id: &str) -> Result<Option<ProgramDoc>, SyncError> {
        let route = format!("/program/{id}");
        let (status, bytes) = self.send(Method::Get, &route, None, "fetch-program")?;
        if !is_ok(status) {
            return Ok(None);
        }
        let steps: Vec<ProgramStep> = serde_json::from_slice(&bytes).map_err(|e| {
            error!("fetch-program: malformed steps: {e}");
            SyncError::new("fetch-program")
        })?;
        Ok(Some(ProgramDoc {
            id: id.to_string(),
            steps,
        }))
    }

    fn delete_program(&mut self) -> Result<bool, SyncError> {
        let (status, _) = self.send(Method::Delete, "/smoker/program", None, "delete-program")?;
        Ok(is_ok(status))
    }
}
