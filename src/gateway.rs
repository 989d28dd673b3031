//! Wire contract and transport for the `send-many` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::error::{ConfigError, GatewayError};
use crate::signing::AuthHeader;

pub const SEND_MANY_PATH: &str = "/messages/v4/send-many";

/// Message kind understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// Long message with a subject line.
    #[serde(rename = "LMS")]
    Lms,
}

/// One message inside a `send-many` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub from: String,
    pub text: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub subject: String,
}

/// Body of `POST /messages/v4/send-many`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendManyRequest {
    pub messages: Vec<OutboundMessage>,
}

/// Successful `send-many` response. Only logged; every field is optional and
/// unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendManyResponse {
    #[serde(default)]
    pub group_info: Option<GroupInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub count: Option<GroupCount>,
}

/// Counters the gateway reports for a message group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupCount {
    pub total: u64,
    pub sent_total: u64,
    pub sent_failed: u64,
    pub sent_success: u64,
    pub sent_pending: u64,
    pub registered_failed: u64,
    pub registered_success: u64,
}

/// Transport to the bulk messaging gateway.
///
/// One call carries one whole batch and either succeeds or fails as a unit.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send_many(
        &self,
        request: &SendManyRequest,
        auth: &AuthHeader,
    ) -> Result<SendManyResponse, GatewayError>;
}

/// `reqwest`-backed gateway.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    url: String,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "SOLAPI_BASE_URL",
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: format!("{}{}", config.base_url.trim_end_matches('/'), SEND_MANY_PATH),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn send_many(
        &self,
        request: &SendManyRequest,
        auth: &AuthHeader,
    ) -> Result<SendManyResponse, GatewayError> {
        let (name, value) = auth.header();
        let response = self
            .client
            .post(&self.url)
            .header(name, value)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    tracing::warn!(
                        status = status.as_u16(),
                        error = %err,
                        "failed to read error body"
                    );
                    format!("<unreadable body: {err}>")
                }
            };
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Accepted; the body only feeds the log.
        match response.bytes().await {
            Ok(bytes) => Ok(decode_accepted(&bytes)),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read accepted response body");
                Ok(SendManyResponse::default())
            }
        }
    }
}

/// Best-effort parse of a 2xx body.
fn decode_accepted(bytes: &[u8]) -> SendManyResponse {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return SendManyResponse::default();
    }
    serde_json::from_slice(bytes).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "unrecognized gateway response body");
        SendManyResponse::default()
    })
}

/// Stand-in for dry-run deployments without credentials. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

#[async_trait]
impl Gateway for Disconnected {
    async fn send_many(
        &self,
        _request: &SendManyRequest,
        _auth: &AuthHeader,
    ) -> Result<SendManyResponse, GatewayError> {
        Err(GatewayError::Network("no gateway configured".to_string()))
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Network(err.to_string())
    }
}
