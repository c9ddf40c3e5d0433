use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    DEFAULT_BASE_URL, device_status_path, level_data, power_data, side_level_path,
    side_power_path,
};
use crate::types::{DeviceStatus, Level, Side};
use crate::{Error, Result};

/// The vendor cloud calls the bridge needs. Implementations may be slow;
/// callers go through [`crate::Pod`] to avoid repeating them.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    async fn device_status(&self, device_id: &str) -> Result<DeviceStatus>;

    async fn set_side_on(&self, device_id: &str, side: Side) -> Result<()>;

    async fn set_side_off(&self, device_id: &str, side: Side) -> Result<()>;

    async fn set_side_level(&self, device_id: &str, side: Side, level: Level) -> Result<()>;

    /// Authenticated GET of `path`, failing unless the response status is
    /// `expected_status`.
    async fn json(&self, path: &str, expected_status: u16) -> Result<Value>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClient {
    pub id: String,
    pub secret: String,
}

/// Serializable credentials and token state of a vendor client, persisted
/// with each accessory so it can be rebuilt after a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_client: Option<OAuthClient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_oauth_client(mut self, client: Option<OAuthClient>) -> Self {
        self.oauth_client = client;
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

pub struct EightSleepClientBuilder {
    session: Session,
    base_url: String,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl EightSleepClientBuilder {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            base_url: DEFAULT_BASE_URL.to_string(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<EightSleepClient> {
        let http = reqwest::Client::builder().build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        Ok(EightSleepClient {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            session: self.session,
            logger,
        })
    }
}

/// reqwest-backed [`DeviceApi`] against the Eight Sleep app API.
pub struct EightSleepClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
    logger: Option<Mutex<MessageLogger>>,
}

impl EightSleepClient {
    pub fn builder(session: Session) -> EightSleepClientBuilder {
        EightSleepClientBuilder::new(session)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.access_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn log(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(ref logger) = self.logger {
            f(&mut logger.lock());
        }
    }

    async fn get_json(&self, path: &str, expected_status: Option<u16>) -> Result<Value> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        self.log(|l| l.log_request("GET", path, None));

        let resp = self.authorized(self.http.get(&url)).send().await?;
        let status = resp.status().as_u16();
        let resp = match expected_status {
            Some(expected) if status != expected => {
                return Err(Error::UnexpectedStatus {
                    path: path.to_string(),
                    status,
                    expected,
                });
            }
            Some(_) => resp,
            None => resp.error_for_status()?,
        };

        let body: Value = resp.json().await?;
        self.log(|l| l.log_response(path, status, &body));
        Ok(body)
    }

    async fn put_command(&self, action: &str, side: Side, path: &str, data: Value) -> Result<()> {
        let url = self.url(path);
        debug!(url = %url, action, side = %side, "PUT");
        self.log(|l| l.log_command(action, side, &data));

        self.authorized(self.http.put(&url))
            .json(&data)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl DeviceApi for EightSleepClient {
    async fn device_status(&self, device_id: &str) -> Result<DeviceStatus> {
        let body = self.get_json(&device_status_path(device_id), None).await?;
        Ok(DeviceStatus::new(body))
    }

    async fn set_side_on(&self, device_id: &str, side: Side) -> Result<()> {
        let path = side_power_path(device_id, side);
        self.put_command("turn_on", side, &path, power_data(true)).await
    }

    async fn set_side_off(&self, device_id: &str, side: Side) -> Result<()> {
        let path = side_power_path(device_id, side);
        self.put_command("turn_off", side, &path, power_data(false)).await
    }

    async fn set_side_level(&self, device_id: &str, side: Side, level: Level) -> Result<()> {
        let path = side_level_path(device_id, side);
        self.put_command("set_level", side, &path, level_data(level)).await
    }

    async fn json(&self, path: &str, expected_status: u16) -> Result<Value> {
        self.get_json(path, Some(expected_status)).await
    }
}
