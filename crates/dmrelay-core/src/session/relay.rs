//! HTTP relay collaborator
//!
//! Delegates authentication and delivery to a remote relay service. Every
//! request carries the session credential in `X-Session-Id` and, when a
//! signing secret is configured, an HMAC-SHA256 of the body in
//! `X-Relay-Signature`.

use super::{Authenticator, BrowserSession, MessageSender, SendError};
use async_trait::async_trait;
use dmrelay_common::config::RelayConfig;
use dmrelay_common::{Error, Result};
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SESSION_HEADER: &str = "X-Session-Id";
const SIGNATURE_HEADER: &str = "X-Relay-Signature";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionBody<'a> {
    session_id: &'a str,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    recipient: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
struct ValidateResponse {
    valid: bool,
}

#[derive(Deserialize)]
struct SendResponse {
    sent: bool,
}

/// Authenticator and sender backed by an HTTP relay
pub struct HttpRelay {
    base_url: Url,
    client: Client,
    signing_secret: Option<String>,
    /// Credentials of authenticated sessions
    credentials: Arc<RwLock<HashMap<Uuid, String>>>,
}

impl HttpRelay {
    /// Create a relay client from configuration
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid relay URL '{}': {}", config.url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Relay URL cannot be a base: {}",
                config.url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            signing_secret: config.signing_secret.clone(),
            credentials: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn sign(&self, body: &[u8]) -> Result<Option<String>> {
        let Some(secret) = self.signing_secret.as_ref() else {
            return Ok(None);
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid HMAC key: {}", e)))?;
        mac.update(body);
        Ok(Some(hex::encode(mac.finalize().into_bytes())))
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        session: &BrowserSession,
        credential: &str,
        body: Vec<u8>,
    ) -> Result<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| Error::Internal(format!("Invalid relay path {}: {}", path, e)))?;

        let mut request = self
            .client
            .request(method, url)
            .header(SESSION_HEADER, credential)
            .timeout(session.options().timeout);

        if !body.is_empty() {
            request = request.header(CONTENT_TYPE, "application/json");
        }
        if let Some(signature) = self.sign(&body)? {
            request = request.header(SIGNATURE_HEADER, format!("sha256={}", signature));
        }

        Ok(request.body(body))
    }

    async fn credential_for(&self, session: &BrowserSession) -> Option<String> {
        self.credentials.read().await.get(&session.id()).cloned()
    }
}

#[async_trait]
impl Authenticator for HttpRelay {
    async fn authenticate(&self, session: &BrowserSession, credential: &str) -> Result<bool> {
        let body = serde_json::to_vec(&SessionBody {
            session_id: credential,
        })?;
        let response = self
            .request(Method::POST, "v1/session", session, credential, body)?
            .send()
            .await
            .map_err(|e| Error::Authentication(format!("Relay request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => {
                self.credentials
                    .write()
                    .await
                    .insert(session.id(), credential.to_string());
                debug!(session_id = %session.id(), "Relay accepted session");
                Ok(true)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(session_id = %session.id(), status = %response.status(), "Relay rejected session");
                Ok(false)
            }
            status => Err(Error::Authentication(format!(
                "Relay returned status {}",
                status
            ))),
        }
    }

    async fn validate(&self, session: &BrowserSession) -> Result<bool> {
        let Some(credential) = self.credential_for(session).await else {
            return Ok(false);
        };

        let response = self
            .request(Method::GET, "v1/session", session, &credential, Vec::new())?
            .send()
            .await
            .map_err(|e| Error::Authentication(format!("Relay request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => {
                let body: ValidateResponse = response.json().await.map_err(|e| {
                    Error::Authentication(format!("Invalid relay response: {}", e))
                })?;
                Ok(body.valid)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status => Err(Error::Authentication(format!(
                "Relay returned status {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl MessageSender for HttpRelay {
    async fn send(
        &self,
        session: &BrowserSession,
        recipient: &str,
        body: &str,
    ) -> std::result::Result<bool, SendError> {
        let credential = self
            .credential_for(session)
            .await
            .ok_or_else(|| SendError::SessionExpired("session not authenticated".to_string()))?;

        let payload = serde_json::to_vec(&MessageBody {
            recipient,
            message: body,
        })
        .map_err(|e| SendError::Transient(e.to_string()))?;

        let request = self
            .request(Method::POST, "v1/messages", session, &credential, payload)
            .map_err(|e| SendError::Transient(e.to_string()))?;
        let response = request
            .send()
            .await
            .map_err(|e| SendError::Transient(format!("Relay request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => {
                let body: SendResponse = response
                    .json()
                    .await
                    .map_err(|e| SendError::Transient(format!("Invalid relay response: {}", e)))?;
                Ok(body.sent)
            }
            StatusCode::NOT_FOUND => Err(SendError::UserNotFound(recipient.to_string())),
            StatusCode::FORBIDDEN => Err(SendError::Blocked(recipient.to_string())),
            StatusCode::UNAUTHORIZED => {
                self.credentials.write().await.remove(&session.id());
                Err(SendError::SessionExpired("relay returned 401".to_string()))
            }
            status => Err(SendError::Transient(format!(
                "Relay returned status {}",
                status
            ))),
        }
    }
}
